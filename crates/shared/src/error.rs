use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error model handed to the view layer: a fixed message plus the upstream detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}: {error}")]
pub struct PageError {
    pub message: String,
    pub error: String,
}

impl PageError {
    pub fn new(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: error.into(),
        }
    }
}

/// Structured error payload the upstream API returns on application failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
