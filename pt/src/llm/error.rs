//! Model client errors

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited by the model provider, wait {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Model API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unusable model response: {0}")]
    InvalidResponse(String),

    #[error("Model client misconfigured: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Provider or network trouble that a later attempt might not hit
    ///
    /// Only logged; a failed generation is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::InvalidResponse(_) | Self::Config(_) | Self::Json(_) => false,
        }
    }
}
