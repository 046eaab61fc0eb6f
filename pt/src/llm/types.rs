//! Request/response types for generative model calls
//!
//! Modeled on the Gemini `generateContent` API: a single user turn made of
//! text and inline-data parts, optionally grounded with web search or
//! constrained to a JSON response schema.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One part of the user turn
#[derive(Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::InlineData { mime_type, data } => f
                .debug_struct("InlineData")
                .field("mime_type", mime_type)
                .field("len", &data.len())
                .finish(),
        }
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::InlineData { .. } => None,
        }
    }
}

/// A generation request - everything needed for one model call
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Parts of the single user turn, in order
    pub parts: Vec<Part>,

    /// Let the model ground its answer with live web search
    pub web_search: bool,

    /// Constrain the reply to JSON matching this schema
    pub response_schema: Option<serde_json::Value>,
}

impl GenerateRequest {
    /// Text-only request grounded with web search
    pub fn web_grounded(prompt: impl Into<String>) -> Self {
        debug!("GenerateRequest::web_grounded: called");
        Self {
            parts: vec![Part::text(prompt)],
            web_search: true,
            response_schema: None,
        }
    }

    /// Image + prompt request constrained to a JSON schema
    pub fn with_image(mime_type: impl Into<String>, data: Vec<u8>, prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        debug!(len = data.len(), "GenerateRequest::with_image: called");
        Self {
            parts: vec![
                Part::InlineData {
                    mime_type: mime_type.into(),
                    data,
                },
                Part::text(prompt),
            ],
            web_search: false,
            response_schema: Some(schema),
        }
    }

    /// All text parts joined with newlines
    pub fn prompt_text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect::<Vec<_>>().join("\n")
    }

    pub fn has_inline_data(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::InlineData { .. }))
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    MaxTokens,
    Safety,
    Other(String),
}

impl FinishReason {
    /// Parse from the Gemini `finishReason` string
    pub fn from_gemini(s: &str) -> Self {
        debug!(%s, "FinishReason::from_gemini: called");
        match s {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" => Self::Safety,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Token usage reported by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response from a generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// Text of the first candidate (if any)
    pub text: Option<String>,

    pub finish_reason: FinishReason,

    pub usage: TokenUsage,
}

impl GenerateResponse {
    /// Convenience for building a plain text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}
