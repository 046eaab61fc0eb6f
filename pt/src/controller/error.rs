//! Controller errors

use thiserror::Error;

use crate::domain::{InputError, PreferencesError};

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The current view does not accept this action. State is unchanged.
    #[error("Cannot {action} from the {from} view")]
    InvalidTransition { from: &'static str, action: &'static str },

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error("No image or link is held for this trip, so it cannot be regenerated")]
    MissingInput,

    #[error("No saved trip with id {0}")]
    UnknownTrip(String),

    #[error("Controller channel closed")]
    ChannelError,
}
