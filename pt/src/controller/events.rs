//! Events broadcast by the controller

use super::{SaveStatus, View};

/// Something a renderer should react to
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ViewChanged(View),
    SaveStatusChanged(SaveStatus),
    /// A coarse user-facing message
    Alert { message: String },
}

impl ControllerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ViewChanged(_) => "view_changed",
            Self::SaveStatusChanged(_) => "save_status_changed",
            Self::Alert { .. } => "alert",
        }
    }
}
