use std::{fs, time::Duration};

use serde::Deserialize;
use tracing::warn;
use upstream_client::{UpstreamConfig, DEFAULT_API_BASE};

const SETTINGS_FILE: &str = "web.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub api_base: String,
    /// 0 disables the per-call upstream deadline.
    pub upstream_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:3001".into(),
            api_base: DEFAULT_API_BASE.into(),
            upstream_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            api_base: self.api_base.clone(),
            timeout: (self.upstream_timeout_secs > 0)
                .then(|| Duration::from_secs(self.upstream_timeout_secs)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    port: Option<u16>,
    api_base: Option<String>,
    upstream_timeout_secs: Option<u64>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(file = SETTINGS_FILE, %error, "ignoring unreadable settings file");
            return;
        }
    };

    if let Some(port) = file_cfg.port {
        settings.server_bind = format!("0.0.0.0:{port}");
    }
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.api_base {
        settings.api_base = v;
    }
    if let Some(v) = file_cfg.upstream_timeout_secs {
        settings.upstream_timeout_secs = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = lookup("APP__API_BASE") {
        settings.api_base = v;
    }

    if let Some(v) = lookup("PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) => settings.server_bind = format!("0.0.0.0:{port}"),
            Err(_) => warn!(value = %v, "ignoring invalid PORT"),
        }
    }
    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    for key in ["UPSTREAM_TIMEOUT_SECS", "APP__UPSTREAM_TIMEOUT_SECS"] {
        if let Some(v) = lookup(key) {
            match v.trim().parse::<u64>() {
                Ok(parsed) => settings.upstream_timeout_secs = parsed,
                Err(_) => warn!(key, value = %v, "ignoring invalid upstream timeout"),
            }
        }
    }

    if let Some(v) = lookup("APP__MAX_BODY_BYTES") {
        match v.trim().parse::<usize>() {
            Ok(parsed) => settings.max_body_bytes = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid body limit"),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
