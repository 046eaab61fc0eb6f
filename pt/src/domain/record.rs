//! Persisted trip records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GeneratedResult, Mode, Preferences};

/// Opaque store-assigned trip identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TripId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Errors decoding a stored record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record {id}: result_data does not match type {mode}: {source}")]
    ShapeMismatch {
        id: String,
        mode: Mode,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {id}: invalid preferences: {source}")]
    Preferences {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {id}: unknown type '{kind}'")]
    UnknownType { id: String, kind: String },
}

/// A trip as stored, with its mode and result always paired
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub id: TripId,
    pub created_at: DateTime<Utc>,
    pub source_url: Option<String>,
    pub preferences: Preferences,
    pub result: GeneratedResult,
    pub owner_id: String,
}

impl TripRecord {
    pub fn mode(&self) -> Mode {
        self.result.mode()
    }
}

/// Column-shaped form of a record, as the hosted store returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecordWire {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub preferences: serde_json::Value,
    pub result_data: serde_json::Value,
    pub user_id: String,
}

impl TryFrom<TripRecordWire> for TripRecord {
    type Error = RecordError;

    fn try_from(wire: TripRecordWire) -> Result<Self, Self::Error> {
        let mode: Mode = serde_json::from_value(serde_json::Value::String(wire.kind.clone())).map_err(|_| {
            RecordError::UnknownType {
                id: wire.id.clone(),
                kind: wire.kind.clone(),
            }
        })?;
        let preferences = serde_json::from_value(wire.preferences).map_err(|source| RecordError::Preferences {
            id: wire.id.clone(),
            source,
        })?;
        let result = GeneratedResult::from_value(mode, wire.result_data).map_err(|source| {
            RecordError::ShapeMismatch {
                id: wire.id.clone(),
                mode,
                source,
            }
        })?;

        Ok(Self {
            id: TripId(wire.id),
            created_at: wire.created_at,
            source_url: wire.source_url,
            preferences,
            result,
            owner_id: wire.user_id,
        })
    }
}

impl From<&TripRecord> for TripRecordWire {
    fn from(record: &TripRecord) -> Self {
        Self {
            id: record.id.0.clone(),
            created_at: record.created_at,
            kind: record.mode().as_str().to_string(),
            source_url: record.source_url.clone(),
            preferences: serde_json::to_value(&record.preferences).unwrap_or(serde_json::Value::Null),
            result_data: record.result.to_value(),
            user_id: record.owner_id.clone(),
        }
    }
}

/// Insert payload for a freshly generated trip
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub source_url: Option<String>,
    pub preferences: Preferences,
    pub result: GeneratedResult,
}

impl NewTrip {
    pub fn mode(&self) -> Mode {
        self.result.mode()
    }
}

/// In-place update written on regeneration from the edit flow
#[derive(Debug, Clone, PartialEq)]
pub struct TripUpdate {
    pub preferences: Preferences,
    pub result: GeneratedResult,
}

impl TripUpdate {
    pub fn mode(&self) -> Mode {
        self.result.mode()
    }
}
