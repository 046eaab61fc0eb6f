//! Workflow controller
//!
//! A single view-state machine sequencing input capture, mode choice,
//! generation, persistence, result display, edits and reset.

mod error;
mod events;
mod handle;
mod messages;
mod view;
mod workflow;

pub use error::ControllerError;
pub use events::ControllerEvent;
pub use handle::ControllerHandle;
pub use view::{Cycle, SaveStatus, SavedListing, SignOutReason, Snapshot, View};
pub use workflow::{
    Applied, Controller, GENERATION_FAILED_ALERT, GenerationOutcome, PendingGeneration, PendingSave, SaveOutcome,
};
