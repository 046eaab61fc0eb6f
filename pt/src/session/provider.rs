//! Session types and providers

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the session change channel
const EVENT_CAPACITY: usize = 16;

/// Errors from session persistence
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Owner id must not be empty")]
    EmptyOwner,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Id of the signed-in user; every stored trip is attributed to it
    pub owner_id: String,

    /// Bearer token for the hosted store, if it needs one
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            access_token: None,
            expires_at: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, lifetime: Option<Duration>) -> Self {
        self.access_token = Some(token.into());
        self.expires_at = lifetime.map(|l| Utc::now() + l);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A change in session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    /// Explicit sign-out
    SignedOut,
    /// The token lapsed without a sign-out
    Expired,
}

/// Source of the current session plus change notifications
pub trait SessionProvider: Send + Sync {
    /// Current session, if signed in and not expired
    fn current(&self) -> Option<Session>;

    /// Receive every session change from now on
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    fn sign_in(&self, session: Session) -> Result<(), SessionError>;

    fn sign_out(&self) -> Result<(), SessionError>;

    /// Drop the session if its expiry has passed. Returns true when it did.
    fn check_expiry(&self) -> Result<bool, SessionError>;
}

/// Shared state behind both providers
struct SessionCell {
    session: RwLock<Option<Session>>,
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionCell {
    fn new(session: Option<Session>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(session),
            tx,
        }
    }

    // A writer that panicked leaves the lock poisoned; the stored value is still whole
    fn get(&self) -> Option<Session> {
        let guard = self.session.read().unwrap_or_else(|e| {
            warn!("Session lock poisoned, recovering for read");
            e.into_inner()
        });
        guard.clone()
    }

    fn set(&self, session: Option<Session>) {
        let mut guard = self.session.write().unwrap_or_else(|e| {
            warn!("Session lock poisoned, recovering for write");
            e.into_inner()
        });
        *guard = session;
    }

    fn emit(&self, event: SessionEvent) {
        debug!(?event, "SessionCell::emit");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    fn current(&self) -> Option<Session> {
        self.get().filter(|s| !s.is_expired(Utc::now()))
    }
}

/// Session held in memory only
pub struct MemorySessionProvider {
    cell: SessionCell,
}

impl MemorySessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            cell: SessionCell::new(session),
        }
    }

    pub fn signed_in(owner_id: impl Into<String>) -> Self {
        Self::new(Some(Session::new(owner_id)))
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }
}

impl SessionProvider for MemorySessionProvider {
    fn current(&self) -> Option<Session> {
        self.cell.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.cell.tx.subscribe()
    }

    fn sign_in(&self, session: Session) -> Result<(), SessionError> {
        if session.owner_id.trim().is_empty() {
            return Err(SessionError::EmptyOwner);
        }
        self.cell.set(Some(session.clone()));
        self.cell.emit(SessionEvent::SignedIn(session));
        Ok(())
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        self.cell.set(None);
        self.cell.emit(SessionEvent::SignedOut);
        Ok(())
    }

    fn check_expiry(&self) -> Result<bool, SessionError> {
        match self.cell.get() {
            Some(session) if session.is_expired(Utc::now()) => {
                self.cell.set(None);
                self.cell.emit(SessionEvent::Expired);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Session persisted as JSON so it survives restarts
pub struct FileSessionProvider {
    path: PathBuf,
    cell: SessionCell,
}

impl FileSessionProvider {
    /// Open the session file; a missing file means signed out
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "FileSessionProvider::open: called");
        let session = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Session>(&content) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            path,
            cell: SessionCell::new(session),
        })
    }

    fn persist(&self, session: Option<&Session>) -> Result<(), SessionError> {
        match session {
            Some(session) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
            }
            None => {
                if self.path.exists() {
                    std::fs::remove_file(&self.path)?;
                }
            }
        }
        Ok(())
    }
}

impl SessionProvider for FileSessionProvider {
    fn current(&self) -> Option<Session> {
        self.cell.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.cell.tx.subscribe()
    }

    fn sign_in(&self, session: Session) -> Result<(), SessionError> {
        if session.owner_id.trim().is_empty() {
            return Err(SessionError::EmptyOwner);
        }
        self.persist(Some(&session))?;
        info!(owner_id = %session.owner_id, "Signed in");
        self.cell.set(Some(session.clone()));
        self.cell.emit(SessionEvent::SignedIn(session));
        Ok(())
    }

    fn sign_out(&self) -> Result<(), SessionError> {
        self.persist(None)?;
        info!("Signed out");
        self.cell.set(None);
        self.cell.emit(SessionEvent::SignedOut);
        Ok(())
    }

    fn check_expiry(&self) -> Result<bool, SessionError> {
        match self.cell.get() {
            Some(session) if session.is_expired(Utc::now()) => {
                self.persist(None)?;
                info!(owner_id = %session.owner_id, "Session expired");
                self.cell.set(None);
                self.cell.emit(SessionEvent::Expired);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
