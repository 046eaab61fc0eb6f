//! View state and per-cycle data

use crate::domain::{GeneratedResult, InputReference, Mode, Preferences, TripId, TripRecord};

/// Why the user is looking at the sign-in screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// No session was found at startup
    NoSession,
    SignedOut,
    Expired,
}

/// Outcome of loading the saved-trip list
#[derive(Debug, Clone, PartialEq)]
pub enum SavedListing {
    Loaded(Vec<TripRecord>),
    Failed(String),
}

/// The current screen. Each variant carries only the data that screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Unauthenticated {
        reason: SignOutReason,
    },
    AwaitingPermission,
    Home,
    ModeSelection {
        preview: String,
    },
    Preferences {
        draft: Preferences,
        preview: Option<String>,
        result: GeneratedResult,
    },
    Generating {
        mode: Mode,
    },
    Result {
        result: GeneratedResult,
    },
    SavedList {
        listing: SavedListing,
    },
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::AwaitingPermission => "awaiting-permission",
            Self::Home => "home",
            Self::ModeSelection { .. } => "mode-selection",
            Self::Preferences { .. } => "preferences",
            Self::Generating { .. } => "generating",
            Self::Result { .. } => "result",
            Self::SavedList { .. } => "saved-list",
        }
    }

    /// The generated result this view shows or keeps for a cancel
    pub fn result(&self) -> Option<&GeneratedResult> {
        match self {
            Self::Preferences { result, .. } | Self::Result { result } => Some(result),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating { .. })
    }

    /// Views only reachable with a signed-in session that granted permission
    pub fn is_signed_in(&self) -> bool {
        !matches!(self, Self::Unauthenticated { .. } | Self::AwaitingPermission)
    }
}

/// Whether the current result has been durably stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Data carried across the views of one trip cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cycle {
    pub input: Option<InputReference>,
    pub mode: Option<Mode>,
    pub preferences: Preferences,
    /// Id of the stored record this cycle writes to; decides insert vs update
    pub bound_trip_id: Option<TripId>,
    pub save_status: SaveStatus,
}

/// Point-in-time copy of controller state for renderers and tests
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub view: View,
    pub cycle: Cycle,
}

impl Snapshot {
    pub fn result(&self) -> Option<&GeneratedResult> {
        self.view.result()
    }
}
