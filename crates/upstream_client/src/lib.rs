use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Availability, Parameters, Schedule, SlotCatalogEntry},
    error::UpstreamErrorBody,
    protocol::{GenerateRequest, GenerateResponse, ImportRequest, ImportResponse},
};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

pub mod envelope;
pub use envelope::ResultEnvelope;

pub const DEFAULT_API_BASE: &str = "http://localhost:5678";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_base: String,
    /// Per-call deadline. `None` leaves calls unbounded.
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Application { status: StatusCode, message: String },
    #[error("malformed upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The upstream scheduling API, one method per consumed endpoint. Every call
/// resolves to an envelope; nothing is raised past this boundary.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn schedules(&self) -> ResultEnvelope<Vec<Schedule>>;
    async fn availabilities(&self) -> ResultEnvelope<Vec<Availability>>;
    async fn parameters(&self) -> ResultEnvelope<Parameters>;
    async fn slots(&self) -> ResultEnvelope<Vec<SlotCatalogEntry>>;
    async fn schedule(&self, id: &str) -> ResultEnvelope<Schedule>;
    async fn availability(&self, id: &str) -> ResultEnvelope<Availability>;
    async fn generate_schedule(
        &self,
        request: &GenerateRequest,
    ) -> ResultEnvelope<GenerateResponse>;
    /// Any 2xx counts as imported; the counts are `None` when the body does not carry them.
    async fn import_availability(
        &self,
        request: &ImportRequest,
    ) -> ResultEnvelope<Option<ImportResponse>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base: Url,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let base = Url::parse(config.api_base.trim())
            .with_context(|| format!("invalid upstream base url '{}'", config.api_base))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!(
                "upstream base url '{}' cannot carry a path",
                config.api_base
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build upstream http client")?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Appends percent-encoded path segments to the configured base.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn request<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> ResultEnvelope<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let outcome = self
            .send(method.clone(), segments, body)
            .await
            .and_then(|bytes| decode_body(&bytes));
        settle(&method, segments, outcome)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ResultEnvelope<T> {
        self.request::<T, ()>(Method::GET, segments, None).await
    }

    /// Raw body of a 2xx response; anything else becomes an error.
    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Vec<u8>, UpstreamError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(UpstreamError::Application {
                status,
                message: application_error_message(status, &bytes),
            });
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn schedules(&self) -> ResultEnvelope<Vec<Schedule>> {
        self.get(&["schedules"]).await
    }

    async fn availabilities(&self) -> ResultEnvelope<Vec<Availability>> {
        self.get(&["availabilities"]).await
    }

    async fn parameters(&self) -> ResultEnvelope<Parameters> {
        self.get(&["parameters"]).await
    }

    async fn slots(&self) -> ResultEnvelope<Vec<SlotCatalogEntry>> {
        self.get(&["slots"]).await
    }

    async fn schedule(&self, id: &str) -> ResultEnvelope<Schedule> {
        self.get(&["schedule", id]).await
    }

    async fn availability(&self, id: &str) -> ResultEnvelope<Availability> {
        self.get(&["availability", id]).await
    }

    async fn generate_schedule(
        &self,
        request: &GenerateRequest,
    ) -> ResultEnvelope<GenerateResponse> {
        self.request(Method::POST, &["schedule", "generate"], Some(request))
            .await
    }

    async fn import_availability(
        &self,
        request: &ImportRequest,
    ) -> ResultEnvelope<Option<ImportResponse>> {
        let segments = ["availability", "import"];
        let outcome = self
            .send(Method::POST, &segments, Some(request))
            .await
            .map(|bytes| {
                let counts = serde_json::from_slice::<ImportResponse>(&bytes);
                if let Err(err) = &counts {
                    debug!(error = %err, "import succeeded without readable counts");
                }
                counts.ok()
            });
        settle(&Method::POST, &segments, outcome)
    }
}

fn settle<T>(
    method: &Method,
    segments: &[&str],
    outcome: Result<T, UpstreamError>,
) -> ResultEnvelope<T> {
    if let Err(err) = &outcome {
        let endpoint = format!("/{}", segments.join("/"));
        error!(%method, %endpoint, error = %err, "upstream request failed");
    }
    outcome.into()
}

/// The upstream's `error` field when it sent one, else a generic status line.
fn application_error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<UpstreamErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| format!("upstream responded with status {}", status.as_u16()))
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, UpstreamError> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
