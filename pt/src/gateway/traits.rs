//! TripGateway trait definition

use async_trait::async_trait;

use super::GatewayError;
use crate::domain::{NewTrip, TripId, TripRecord, TripUpdate};
use crate::session::Session;

/// CRUD surface for persisted trips
///
/// Every call is attributed to the session's owner. Implementations must only
/// ever read, modify or delete that owner's records.
#[async_trait]
pub trait TripGateway: Send + Sync {
    /// Store a new trip and return its assigned id
    async fn insert(&self, session: &Session, trip: NewTrip) -> Result<TripId, GatewayError>;

    async fn update(&self, session: &Session, id: &TripId, update: TripUpdate) -> Result<(), GatewayError>;

    /// All of the owner's trips, newest first
    async fn list_by_owner(&self, session: &Session) -> Result<Vec<TripRecord>, GatewayError>;

    async fn delete(&self, session: &Session, id: &TripId) -> Result<(), GatewayError>;
}

/// Mock gateway for testing
#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};

    use super::*;

    /// A recorded gateway call
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Insert(NewTrip),
        Update(TripId, TripUpdate),
        List,
        Delete(TripId),
    }

    /// In-memory gateway that records calls and can be told to fail
    pub struct MockGateway {
        records: Mutex<Vec<TripRecord>>,
        calls: Mutex<Vec<Call>>,
        next_id: AtomicUsize,
        fail_writes: Mutex<Option<String>>,
        fail_reads: Mutex<Option<String>>,
        write_delay: Mutex<Option<std::time::Duration>>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self::new(Vec::new())
        }
    }

    impl MockGateway {
        pub fn new(records: Vec<TripRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                calls: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(1),
                fail_writes: Mutex::new(None),
                fail_reads: Mutex::new(None),
                write_delay: Mutex::new(None),
            }
        }

        /// Make insert, update and delete fail with a store error
        pub fn fail_writes(&self, message: &str) {
            *self.fail_writes.lock().unwrap() = Some(message.to_string());
        }

        /// Make insert and update take `delay` before touching the records
        pub fn delay_writes(&self, delay: std::time::Duration) {
            *self.write_delay.lock().unwrap() = Some(delay);
        }

        async fn pause(&self) {
            let delay = *self.write_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        pub fn fail_reads(&self, message: &str) {
            *self.fail_reads.lock().unwrap() = Some(message.to_string());
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn records(&self) -> Vec<TripRecord> {
            self.records.lock().unwrap().clone()
        }

        fn check(&self, slot: &Mutex<Option<String>>) -> Result<(), GatewayError> {
            match slot.lock().unwrap().clone() {
                Some(message) => Err(GatewayError::Store(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TripGateway for MockGateway {
        async fn insert(&self, session: &Session, trip: NewTrip) -> Result<TripId, GatewayError> {
            self.pause().await;
            self.calls.lock().unwrap().push(Call::Insert(trip.clone()));
            self.check(&self.fail_writes)?;
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = TripId::new(format!("trip-{}", n));
            self.records.lock().unwrap().push(TripRecord {
                id: id.clone(),
                created_at: Utc::now() + Duration::milliseconds(n as i64),
                source_url: trip.source_url,
                preferences: trip.preferences,
                result: trip.result,
                owner_id: session.owner_id.clone(),
            });
            Ok(id)
        }

        async fn update(&self, session: &Session, id: &TripId, update: TripUpdate) -> Result<(), GatewayError> {
            self.pause().await;
            self.calls.lock().unwrap().push(Call::Update(id.clone(), update.clone()));
            self.check(&self.fail_writes)?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| &r.id == id && r.owner_id == session.owner_id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            record.preferences = update.preferences;
            record.result = update.result;
            Ok(())
        }

        async fn list_by_owner(&self, session: &Session) -> Result<Vec<TripRecord>, GatewayError> {
            self.calls.lock().unwrap().push(Call::List);
            self.check(&self.fail_reads)?;
            let mut records: Vec<TripRecord> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.owner_id == session.owner_id)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        }

        async fn delete(&self, session: &Session, id: &TripId) -> Result<(), GatewayError> {
            self.calls.lock().unwrap().push(Call::Delete(id.clone()));
            self.check(&self.fail_writes)?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(&r.id == id && r.owner_id == session.owner_id));
            if records.len() == before {
                return Err(GatewayError::NotFound(id.to_string()));
            }
            Ok(())
        }
    }
}
