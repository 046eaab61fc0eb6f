//! Controller actor messages

use tokio::sync::oneshot;

use super::{ControllerError, PendingGeneration, PendingSave, Snapshot};
use super::workflow::{GenerationOutcome, SaveOutcome};
use crate::domain::{ImagePayload, Mode, Preferences, TripId};

/// Reply carrying the state after the intent was applied
pub type IntentReply = oneshot::Sender<Result<Snapshot, ControllerError>>;

/// User intents sent to the controller actor
#[derive(Debug)]
pub enum Intent {
    Startup { reply: IntentReply },
    GrantPermission { reply: IntentReply },
    SubmitImage { image: ImagePayload, reply: IntentReply },
    SubmitLink { link: String, reply: IntentReply },
    /// Replies once generation has started
    SelectMode { mode: Mode, reply: IntentReply },
    DismissModeSelection { reply: IntentReply },
    Edit { reply: IntentReply },
    SetPreference { assignment: String, reply: IntentReply },
    /// Replies once generation has started
    SubmitPreferences { preferences: Preferences, reply: IntentReply },
    CancelPreferences { reply: IntentReply },
    Reset { reply: IntentReply },
    ShowSaved { reply: IntentReply },
    BackHome { reply: IntentReply },
    SelectSaved { id: TripId, reply: IntentReply },
    DeleteSaved {
        id: TripId,
        reply: oneshot::Sender<Result<bool, ControllerError>>,
    },
    Snapshot { reply: oneshot::Sender<Snapshot> },
}

/// Work finished off the actor, fed back from its spawned task
#[derive(Debug)]
pub enum Finished {
    Generation {
        pending: PendingGeneration,
        outcome: GenerationOutcome,
    },
    Save {
        pending: PendingSave,
        outcome: SaveOutcome,
    },
}
