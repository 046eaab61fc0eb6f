//! Generation Service
//!
//! Prompt construction, response schemas, reply extraction, and the service
//! that ties them to a model client.

pub mod embedded;
mod error;
pub mod extract;
mod prompts;
pub mod schema;
mod service;

pub use error::GenerationError;
pub use extract::extract_json;
pub use prompts::{PromptContext, PromptLoader};
pub use service::GenerationService;
