//! Generation Service
//!
//! Turns an input reference plus preferences into one of the two result
//! shapes. Link input goes out as a web-grounded text request and the reply
//! runs through the fence-tolerant extractor; image input goes out with the
//! image inline and a response schema, and the reply must be strict JSON.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::extract::extract_json;
use super::prompts::{PromptContext, PromptLoader, core_template, link_template};
use super::{GenerationError, schema};
use crate::domain::{GeneratedResult, ImagePayload, InputReference, Mode, Preferences};
use crate::llm::{GenerateRequest, LlmClient};

pub struct GenerationService {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
}

impl GenerationService {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader) -> Self {
        debug!(model = %llm.model(), "GenerationService::new: called");
        Self { llm, prompts }
    }

    /// Build the model request for an input without sending it
    pub fn build_request(
        &self,
        input: &InputReference,
        prefs: &Preferences,
        mode: Mode,
    ) -> Result<GenerateRequest, GenerationError> {
        debug!(%mode, "build_request: called");
        let ctx = PromptContext::from_preferences(prefs);
        let core = self.prompts.render(core_template(mode), &ctx)?;

        match input {
            InputReference::Link(link) => {
                debug!(%link, "build_request: link input, web-grounded request");
                let prompt = self.prompts.render(link_template(mode), &ctx.for_link(link, core))?;
                Ok(GenerateRequest::web_grounded(prompt))
            }
            InputReference::Image(image) => {
                debug!(media_type = %image.media_type, "build_request: image input, schema-constrained request");
                Ok(GenerateRequest::with_image(
                    image.media_type.clone(),
                    image.bytes.clone(),
                    core,
                    schema::for_mode(mode),
                ))
            }
        }
    }

    /// Generate a result for a validated input reference
    pub async fn generate(
        &self,
        input: &InputReference,
        prefs: &Preferences,
        mode: Mode,
    ) -> Result<GeneratedResult, GenerationError> {
        debug!(%mode, is_link = input.as_link().is_some(), "generate: called");
        let request = self.build_request(input, prefs, mode)?;
        let response = self.llm.generate(request).await?;

        let Some(text) = response.text.filter(|t| !t.trim().is_empty()) else {
            warn!(%mode, finish_reason = ?response.finish_reason, "generate: empty response");
            return Err(GenerationError::EmptyResponse);
        };

        let value = match input {
            InputReference::Link(_) => extract_json(&text)?,
            InputReference::Image(_) => {
                serde_json::from_str(&text).map_err(|e| GenerationError::Parse(e.to_string()))?
            }
        };

        let result = GeneratedResult::from_value(mode, value).map_err(|source| GenerationError::Shape { mode, source })?;
        info!(%mode, title = %result.title(), "Generated result");
        Ok(result)
    }

    /// Generate from loose parts, rejecting both-present and neither-present
    /// before any model call
    pub async fn generate_from_parts(
        &self,
        image: Option<ImagePayload>,
        link: Option<String>,
        prefs: &Preferences,
        mode: Mode,
    ) -> Result<GeneratedResult, GenerationError> {
        debug!(has_image = image.is_some(), has_link = link.is_some(), "generate_from_parts: called");
        let input = InputReference::from_parts(image, link)?;
        self.generate(&input, prefs, mode).await
    }
}
