//! Generation error types

use thiserror::Error;

use crate::domain::{InputError, Mode};
use crate::llm::LlmError;

/// Errors from a generation call
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Precondition failure; no model call was made
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("No response from model")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response does not match the {mode} shape: {source}")]
    Shape {
        mode: Mode,
        #[source]
        source: serde_json::Error,
    },

    #[error("Prompt error: {0}")]
    Prompt(String),
}

impl GenerationError {
    /// Whether the model call failed for reasons outside the request itself
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Llm(e) if e.is_transient())
    }
}
