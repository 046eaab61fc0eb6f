//! LlmClient trait definition

use async_trait::async_trait;

use super::{GenerateRequest, GenerateResponse, LlmError};

/// Stateless model client - each call is independent
///
/// One request produces one reply. No conversation history is kept between
/// calls; every generation cycle builds its prompt from scratch.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single generation request and wait for the full reply
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}
