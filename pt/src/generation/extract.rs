//! JSON extraction from free-form model replies
//!
//! Web-grounded replies cannot be schema-constrained, so the JSON may arrive
//! bare or wrapped in a markdown fence. Tiers are tried in a fixed order:
//!
//! 1. the whole text
//! 2. the first ```json fenced block
//! 3. the first fenced block of any kind

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::GenerationError;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid json fence regex"));

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("valid fence regex"));

/// Parse a model reply into a JSON value
pub fn extract_json(text: &str) -> Result<Value, GenerationError> {
    debug!(text_len = text.len(), "extract_json: called");

    if let Ok(value) = serde_json::from_str(text) {
        debug!("extract_json: whole text parsed");
        return Ok(value);
    }

    for (tier, fence) in [("json fence", &*JSON_FENCE), ("untagged fence", &*ANY_FENCE)] {
        if let Some(body) = fence.captures(text).and_then(|c| c.get(1)) {
            match serde_json::from_str(body.as_str()) {
                Ok(value) => {
                    debug!(%tier, "extract_json: fenced block parsed");
                    return Ok(value);
                }
                Err(e) => debug!(%tier, error = %e, "extract_json: fenced block did not parse"),
            }
        }
    }

    Err(GenerationError::Parse(
        "Could not parse JSON response from model".to_string(),
    ))
}
