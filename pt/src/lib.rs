//! PinTrip - turn a pinned image or link into a trip
//!
//! A user signs in, grants permission for their pins to be shared with a
//! generative model, then supplies an image or a link. The model turns it into
//! either a day-by-day travel itinerary or an aesthetic board, which is saved
//! to the user's trip list and can be reopened, edited and regenerated.
//!
//! # Modules
//!
//! - [`domain`] - Inputs, preferences, generated results and trip records
//! - [`llm`] - Model client trait and Gemini implementation
//! - [`generation`] - Prompt building and response decoding
//! - [`gateway`] - Owner-scoped trip persistence (local or hosted)
//! - [`session`] - Signed-in identity and its change events
//! - [`flags`] - Persisted sharing permission
//! - [`controller`] - The generation cycle state machine and its actor
//! - [`repl`] - Interactive terminal client
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod flags;
pub mod gateway;
pub mod generation;
pub mod llm;
pub mod repl;
pub mod session;

// Re-export commonly used types
pub use config::{Config, LlmConfig, StoreConfig};
pub use controller::{Controller, ControllerError, ControllerEvent, ControllerHandle, Cycle, SaveStatus, Snapshot, View};
pub use domain::{GeneratedResult, InputReference, Mode, Preferences, TripId, TripRecord};
pub use flags::{FileFlagStore, FlagStore, MemoryFlagStore};
pub use gateway::{GatewayError, LocalGateway, SupabaseGateway, TripGateway, create_gateway};
pub use generation::{GenerationError, GenerationService, PromptLoader};
pub use llm::{GeminiClient, LlmClient, LlmError, create_client};
pub use session::{FileSessionProvider, MemorySessionProvider, Session, SessionEvent, SessionProvider};
