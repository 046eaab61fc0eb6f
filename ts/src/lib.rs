//! TripStore - owner-scoped persistence for generated trips
//!
//! Stores one row per generated trip in a local SQLite database. Rows are
//! generic: the preference set and the generated result are kept as JSON
//! columns so the store never needs to know the result shapes.
//!
//! Every read and write is scoped to an owner id. A row owned by someone else
//! is indistinguishable from a missing row.
//!
//! # Example
//!
//! ```ignore
//! use tripstore::{NewTripRow, TripStore};
//!
//! let mut store = TripStore::open("/tmp/pintrip")?;
//! let id = store.insert(NewTripRow { owner_id: "user-1".into(), ..row })?;
//! let trips = store.list_by_owner("user-1")?;
//! ```

mod error;
mod store;

pub use error::StoreError;
pub use store::{NewTripRow, TripRow, TripRowUpdate, TripStore};

/// Database file name inside the store directory
pub const DB_FILE: &str = "trips.db";

/// Current time as unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
