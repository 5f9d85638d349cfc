//! Execution engine error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while an engine executes a task
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No API key for {provider}")]
    MissingCredential { provider: String },
}

impl EngineError {
    /// Map a transport error, separating timeouts out
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            EngineError::Timeout(timeout)
        } else {
            EngineError::Network(err)
        }
    }
}
