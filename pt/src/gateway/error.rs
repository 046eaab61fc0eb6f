//! Error types for the persistence gateway

use thiserror::Error;

use crate::domain::RecordError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing, or owned by somebody else. The two are indistinguishable to callers.
    #[error("Trip not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<tripstore::StoreError> for GatewayError {
    fn from(e: tripstore::StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<RecordError> for GatewayError {
    fn from(e: RecordError) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
