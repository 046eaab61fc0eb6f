//! Local flag storage
//!
//! A single durable boolean: whether the user granted the sharing permission.
//! It is read at startup and written once when granted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait FlagStore: Send + Sync {
    fn permission_granted(&self) -> bool;

    fn grant_permission(&self) -> Result<(), FlagError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Flags {
    #[serde(rename = "sharing-permission")]
    sharing_permission: bool,
}

/// Flags kept in a small JSON file
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Flags {
        debug!(path = %self.path.display(), "FileFlagStore::read: called");
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Flags::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Unreadable flags file, treating as unset");
            Flags::default()
        })
    }
}

impl FlagStore for FileFlagStore {
    fn permission_granted(&self) -> bool {
        self.read().sharing_permission
    }

    fn grant_permission(&self) -> Result<(), FlagError> {
        let mut flags = self.read();
        flags.sharing_permission = true;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&flags)?)?;
        info!("Sharing permission granted");
        Ok(())
    }
}

/// Flags held in memory only
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    granted: AtomicBool,
}

impl MemoryFlagStore {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }
}

impl FlagStore for MemoryFlagStore {
    fn permission_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn grant_permission(&self) -> Result<(), FlagError> {
        self.granted.store(true, Ordering::SeqCst);
        Ok(())
    }
}
