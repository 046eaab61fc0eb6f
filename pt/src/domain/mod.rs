//! Domain types for PinTrip
//!
//! Preferences, input references, the two generated result shapes, and the
//! persisted trip record.

mod input;
mod preferences;
mod record;
mod result;

pub use input::{IMAGE_UPLOAD_LABEL, ImagePayload, InputError, InputReference, media_type_for_path};
pub use preferences::{Budget, Preferences, PreferencesError};
pub use record::{NewTrip, RecordError, TripId, TripRecord, TripRecordWire, TripUpdate};
pub use result::{
    BoardResult, BoardScene, GeneratedResult, ItineraryActivity, ItineraryDay, ItineraryResult, Mode,
};
