//! The two result shapes a generation can produce

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which output shape a generation cycle targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Itinerary,
    Board,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Itinerary => "ITINERARY",
            Self::Board => "BOARD",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "itinerary" => Ok(Self::Itinerary),
            "board" => Ok(Self::Board),
            _ => Err(format!("Unknown mode '{}' (expected itinerary or board)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryActivity {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_cost: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryDay {
    /// 1-based day number
    pub day: u32,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub activities: Vec<ItineraryActivity>,
}

/// A day-by-day travel plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryResult {
    pub title: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub total_estimated_cost: String,
    pub days: Vec<ItineraryDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardScene {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub visual_description: String,
    #[serde(default)]
    pub aesthetic_note: String,
    #[serde(default)]
    pub mood: String,
}

/// A visual aesthetic breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardResult {
    pub title: String,
    #[serde(default)]
    pub concept: String,
    pub scenes: Vec<BoardScene>,
}

/// A generated result, tagged by the mode that produced it
///
/// Serializes as the bare inner shape, which is what gets stored in
/// `result_data`. The tag travels separately as the record's `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GeneratedResult {
    Itinerary(ItineraryResult),
    Board(BoardResult),
}

impl GeneratedResult {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Itinerary(_) => Mode::Itinerary,
            Self::Board(_) => Mode::Board,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Itinerary(itinerary) => &itinerary.title,
            Self::Board(board) => &board.title,
        }
    }

    /// Decode a bare JSON value as the shape `mode` calls for
    pub fn from_value(mode: Mode, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        debug!(%mode, "GeneratedResult::from_value: called");
        match mode {
            Mode::Itinerary => serde_json::from_value(value).map(Self::Itinerary),
            Mode::Board => serde_json::from_value(value).map(Self::Board),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Itinerary(itinerary) => serde_json::to_value(itinerary),
            Self::Board(board) => serde_json::to_value(board),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}
