//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults, then renders them with Handlebars.

use std::path::PathBuf;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::GenerationError;
use super::embedded;
use crate::domain::{Mode, Preferences};

/// Values substituted into prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub budget: String,
    pub days: u32,
    pub travelers: String,
    pub vibe: String,
    /// Pin link, for the web-search preambles
    pub link: Option<String>,
    /// Rendered mode prompt, wrapped by the web-search preambles
    pub core: Option<String>,
}

impl PromptContext {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        debug!(?prefs, "PromptContext::from_preferences: called");
        Self {
            budget: prefs.budget.to_string(),
            days: prefs.days,
            travelers: prefs.travelers.clone(),
            vibe: prefs.vibe.clone(),
            link: None,
            core: None,
        }
    }

    /// Context for wrapping an already rendered mode prompt with a link preamble
    pub fn for_link(&self, link: &str, core: String) -> Self {
        Self {
            link: Some(link.to_string()),
            core: Some(core),
            ..self.clone()
        }
    }
}

/// Template name for a mode's core prompt
pub fn core_template(mode: Mode) -> &'static str {
    match mode {
        Mode::Itinerary => "itinerary",
        Mode::Board => "board",
    }
}

/// Template name for a mode's link preamble
pub fn link_template(mode: Mode) -> &'static str {
    match mode {
        Mode::Itinerary => "link-itinerary",
        Mode::Board => "link-board",
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/pintrip/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `override_dir` before the embedded templates
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let override_dir = override_dir.filter(|dir| dir.exists());
        debug!(?override_dir, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            override_dir: None,
        }
    }

    // Values go into a plain-text prompt, so HTML escaping would corrupt them
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `{override_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String, GenerationError> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| GenerationError::Prompt(format!("Failed to read prompt {}: {}", path.display(), e)));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Prompt(format!("Prompt template not found: {}", name)))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String, GenerationError> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| GenerationError::Prompt(format!("Failed to render template {}: {}", template_name, e)))
    }
}
