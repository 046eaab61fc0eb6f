//! User preferences for a generation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Longest trip the edit flow accepts
pub const MAX_DAYS: u32 = 7;

/// Spending level for a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Budget {
    Budget,
    #[default]
    Moderate,
    Luxury,
}

impl Budget {
    pub const ALL: [Budget; 3] = [Budget::Budget, Budget::Moderate, Budget::Luxury];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "Budget",
            Self::Moderate => "Moderate",
            Self::Luxury => "Luxury",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Budget {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "Budget::from_str: called");
        match s.trim().to_lowercase().as_str() {
            "budget" => Ok(Self::Budget),
            "moderate" => Ok(Self::Moderate),
            "luxury" => Ok(Self::Luxury),
            _ => Err(PreferencesError::UnknownBudget(s.to_string())),
        }
    }
}

/// Errors from preference validation or parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreferencesError {
    #[error("Days must be between 1 and 7, got {0}")]
    DaysOutOfRange(u32),

    #[error("Unknown budget '{0}' (expected Budget, Moderate or Luxury)")]
    UnknownBudget(String),

    #[error("{0} must not be empty")]
    EmptyLabel(&'static str),

    #[error("Unknown preference field '{0}'")]
    UnknownField(String),

    #[error("Invalid preference assignment '{0}' (expected key=value)")]
    Malformed(String),
}

/// What the user wants out of a trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub budget: Budget,
    pub days: u32,
    pub travelers: String,
    pub vibe: String,
}

impl Default for Preferences {
    /// The set applied whenever a mode is picked and generation starts automatically
    fn default() -> Self {
        Self {
            budget: Budget::Moderate,
            days: 3,
            travelers: "Couple".to_string(),
            vibe: "Authentic".to_string(),
        }
    }
}

impl Preferences {
    /// Check the values a user can enter through the edit flow
    pub fn validate(&self) -> Result<(), PreferencesError> {
        debug!(?self, "Preferences::validate: called");
        if !(1..=MAX_DAYS).contains(&self.days) {
            return Err(PreferencesError::DaysOutOfRange(self.days));
        }
        if self.travelers.trim().is_empty() {
            return Err(PreferencesError::EmptyLabel("travelers"));
        }
        if self.vibe.trim().is_empty() {
            return Err(PreferencesError::EmptyLabel("vibe"));
        }
        Ok(())
    }

    /// Apply a single `key=value` assignment, e.g. `days=5` or `vibe=Foodie`
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), PreferencesError> {
        debug!(%assignment, "Preferences::apply_assignment: called");
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| PreferencesError::Malformed(assignment.to_string()))?;
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "days" => {
                let days = value
                    .parse::<u32>()
                    .map_err(|_| PreferencesError::Malformed(assignment.to_string()))?;
                if !(1..=MAX_DAYS).contains(&days) {
                    return Err(PreferencesError::DaysOutOfRange(days));
                }
                self.days = days;
            }
            "budget" => self.budget = value.parse()?,
            "travelers" => {
                if value.is_empty() {
                    return Err(PreferencesError::EmptyLabel("travelers"));
                }
                self.travelers = value.to_string();
            }
            "vibe" => {
                if value.is_empty() {
                    return Err(PreferencesError::EmptyLabel("vibe"));
                }
                self.vibe = value.to_string();
            }
            other => return Err(PreferencesError::UnknownField(other.to_string())),
        }
        Ok(())
    }
}
