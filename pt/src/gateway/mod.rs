//! Persistence gateway
//!
//! Trips are stored either in a local SQLite file (the `tripstore` crate) or in
//! a hosted Supabase table. Both enforce that a session only sees its own rows.

mod error;
mod local;
mod supabase;
mod traits;

use std::sync::Arc;

use tracing::debug;

pub use error::GatewayError;
pub use local::LocalGateway;
pub use supabase::SupabaseGateway;
#[cfg(test)]
pub use traits::mock;
pub use traits::TripGateway;

use crate::config::{StoreBackend, StoreConfig};

/// Create the gateway selected by configuration
pub fn create_gateway(config: &StoreConfig) -> Result<Arc<dyn TripGateway>, GatewayError> {
    debug!(backend = ?config.backend, "create_gateway: called");
    match config.backend {
        StoreBackend::Local => Ok(Arc::new(LocalGateway::open(&config.local_dir)?)),
        StoreBackend::Supabase => Ok(Arc::new(SupabaseGateway::from_config(&config.supabase)?)),
    }
}
