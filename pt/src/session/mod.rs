//! Session/identity boundary
//!
//! A provider holds the signed-in session (if any) and broadcasts changes so
//! the controller can drop in-memory trip state on sign-out or expiry.
//! Signing in through the identity provider's redirect flow happens elsewhere;
//! this module only records the outcome.

mod provider;

pub use provider::{FileSessionProvider, MemorySessionProvider, Session, SessionError, SessionEvent, SessionProvider};
