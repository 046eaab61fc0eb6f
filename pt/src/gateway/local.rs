//! Gateway over the local SQLite trip store

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use tripstore::{NewTripRow, TripRow, TripRowUpdate, TripStore};

use super::{GatewayError, TripGateway};
use crate::domain::{NewTrip, TripId, TripRecord, TripRecordWire, TripUpdate};
use crate::session::Session;

/// Trips kept in a SQLite file on this machine
///
/// rusqlite is blocking, so each call runs on the blocking pool while holding
/// the store mutex.
#[derive(Clone)]
pub struct LocalGateway {
    store: Arc<Mutex<TripStore>>,
}

impl LocalGateway {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "LocalGateway::open: called");
        let store = TripStore::open(dir)?;
        info!(dir = %dir.display(), "Opened local trip store");
        Ok(Self::from_store(store))
    }

    pub fn from_store(store: TripStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&mut TripStore) -> Result<T, GatewayError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| GatewayError::Store("trip store lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| GatewayError::Store(format!("store task failed: {}", e)))?
    }
}

fn row_to_record(row: TripRow) -> Result<TripRecord, GatewayError> {
    let wire = TripRecordWire {
        id: row.id,
        created_at: row.created_at,
        kind: row.kind,
        source_url: row.source_url,
        preferences: row.preferences,
        result_data: row.result_data,
        user_id: row.owner_id,
    };
    Ok(TripRecord::try_from(wire)?)
}

#[async_trait]
impl TripGateway for LocalGateway {
    async fn insert(&self, session: &Session, trip: NewTrip) -> Result<TripId, GatewayError> {
        debug!(owner_id = %session.owner_id, mode = %trip.mode(), "LocalGateway::insert: called");
        let row = NewTripRow {
            kind: trip.mode().as_str().to_string(),
            source_url: trip.source_url,
            preferences: serde_json::to_value(&trip.preferences)?,
            result_data: trip.result.to_value(),
            owner_id: session.owner_id.clone(),
        };
        let id = self.with_store(move |store| Ok(store.insert(row)?)).await?;
        Ok(TripId::new(id))
    }

    async fn update(&self, session: &Session, id: &TripId, update: TripUpdate) -> Result<(), GatewayError> {
        debug!(owner_id = %session.owner_id, %id, "LocalGateway::update: called");
        let row = TripRowUpdate {
            kind: update.mode().as_str().to_string(),
            preferences: serde_json::to_value(&update.preferences)?,
            result_data: update.result.to_value(),
        };
        let owner = session.owner_id.clone();
        let key = id.as_str().to_string();
        let updated = self.with_store(move |store| Ok(store.update(&owner, &key, row)?)).await?;
        if !updated {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_by_owner(&self, session: &Session) -> Result<Vec<TripRecord>, GatewayError> {
        debug!(owner_id = %session.owner_id, "LocalGateway::list_by_owner: called");
        let owner = session.owner_id.clone();
        let rows = self.with_store(move |store| Ok(store.list_by_owner(&owner)?)).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row_to_record(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(%id, error = %e, "Skipping undecodable trip row"),
            }
        }
        Ok(records)
    }

    async fn delete(&self, session: &Session, id: &TripId) -> Result<(), GatewayError> {
        debug!(owner_id = %session.owner_id, %id, "LocalGateway::delete: called");
        let owner = session.owner_id.clone();
        let key = id.as_str().to_string();
        let deleted = self.with_store(move |store| Ok(store.delete(&owner, &key)?)).await?;
        if !deleted {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoardResult, GeneratedResult, Preferences};

    fn board(title: &str) -> GeneratedResult {
        GeneratedResult::Board(BoardResult {
            title: title.to_string(),
            concept: "Soft light".to_string(),
            scenes: vec![],
        })
    }

    fn gateway() -> LocalGateway {
        LocalGateway::from_store(TripStore::open_in_memory().unwrap())
    }

    fn new_trip(title: &str) -> NewTrip {
        NewTrip {
            source_url: Some("https://pin.it/abc123".to_string()),
            preferences: Preferences::default(),
            result: board(title),
        }
    }

    #[tokio::test]
    async fn test_insert_then_list() {
        let gw = gateway();
        let alice = Session::new("alice");

        let id = gw.insert(&alice, new_trip("First")).await.unwrap();
        let records = gw.list_by_owner(&alice).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].result.title(), "First");
        assert_eq!(records[0].owner_id, "alice");
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let gw = gateway();
        let alice = Session::new("alice");
        let id = gw.insert(&alice, new_trip("First")).await.unwrap();

        let mut prefs = Preferences::default();
        prefs.days = 5;
        gw.update(
            &alice,
            &id,
            TripUpdate {
                preferences: prefs,
                result: board("Second"),
            },
        )
        .await
        .unwrap();

        let records = gw.list_by_owner(&alice).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result.title(), "Second");
        assert_eq!(records[0].preferences.days, 5);
    }

    #[tokio::test]
    async fn test_foreign_records_look_missing() {
        let gw = gateway();
        let alice = Session::new("alice");
        let mallory = Session::new("mallory");
        let id = gw.insert(&alice, new_trip("Private")).await.unwrap();

        assert!(gw.list_by_owner(&mallory).await.unwrap().is_empty());
        assert!(matches!(gw.delete(&mallory, &id).await, Err(GatewayError::NotFound(_))));
        assert!(matches!(
            gw.update(
                &mallory,
                &id,
                TripUpdate {
                    preferences: Preferences::default(),
                    result: board("Hijack"),
                }
            )
            .await,
            Err(GatewayError::NotFound(_))
        ));

        assert_eq!(gw.list_by_owner(&alice).await.unwrap()[0].result.title(), "Private");
    }

    #[tokio::test]
    async fn test_delete() {
        let gw = gateway();
        let alice = Session::new("alice");
        let id = gw.insert(&alice, new_trip("Gone")).await.unwrap();

        gw.delete(&alice, &id).await.unwrap();
        assert!(gw.list_by_owner(&alice).await.unwrap().is_empty());
        assert!(matches!(gw.delete(&alice, &id).await, Err(GatewayError::NotFound(_))));
    }
}
