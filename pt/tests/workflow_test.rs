//! End-to-end generation cycles against the local trip store

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use pintrip::controller::{Controller, ControllerHandle, SaveStatus, SavedListing, Snapshot, View};
use pintrip::domain::{GeneratedResult, Mode};
use pintrip::flags::MemoryFlagStore;
use pintrip::gateway::{LocalGateway, TripGateway};
use pintrip::generation::{GenerationService, PromptLoader};
use pintrip::llm::{GenerateRequest, GenerateResponse, LlmClient, LlmError};
use pintrip::session::{MemorySessionProvider, SessionProvider};

const PORTO: &str = r#"Here is your trip:
```json
{"title":"Porto Weekend","destination":"Porto","totalEstimatedCost":"$800","days":[
  {"day":1,"theme":"Riverside","activities":[{"time":"Morning","activity":"Ribeira walk","description":"","estimatedCost":"Free","location":"Ribeira"}]},
  {"day":2,"theme":"Wine","activities":[]},
  {"day":3,"theme":"Tiles","activities":[]}]}
```"#;

/// Model stand-in replaying scripted replies
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<GenerateResponse, LlmError>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<GenerateResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct Fixture {
    _dir: TempDir,
    handle: ControllerHandle,
    gateway: Arc<dyn TripGateway>,
    sessions: Arc<dyn SessionProvider>,
}

fn fixture(replies: Vec<Result<GenerateResponse, LlmError>>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let gateway: Arc<dyn TripGateway> = Arc::new(LocalGateway::open(dir.path()).unwrap());
    let sessions: Arc<dyn SessionProvider> = Arc::new(MemorySessionProvider::signed_in("alice"));
    let generation = Arc::new(GenerationService::new(
        ScriptedModel::new(replies),
        PromptLoader::embedded_only(),
    ));
    let controller = Controller::new(
        generation,
        gateway.clone(),
        sessions.clone(),
        Arc::new(MemoryFlagStore::new(true)),
    );
    Fixture {
        _dir: dir,
        handle: ControllerHandle::spawn(controller),
        gateway,
        sessions,
    }
}

/// Poll snapshots until one matches
async fn wait_for(handle: &ControllerHandle, done: impl Fn(&Snapshot) -> bool) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = handle.snapshot().await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("controller did not settle")
}

#[tokio::test]
async fn test_link_itinerary_is_generated_and_saved() {
    let fx = fixture(vec![Ok(GenerateResponse::text(PORTO))]);

    assert_eq!(fx.handle.startup().await.unwrap().view, View::Home);
    let snapshot = fx.handle.submit_link("https://pin.it/abc123").await.unwrap();
    assert!(matches!(snapshot.view, View::ModeSelection { .. }));

    fx.handle.select_mode(Mode::Itinerary).await.unwrap();
    let done = wait_for(&fx.handle, |s| s.cycle.save_status == SaveStatus::Saved).await;

    match done.result() {
        Some(GeneratedResult::Itinerary(itinerary)) => {
            assert_eq!(itinerary.title, "Porto Weekend");
            assert_eq!(itinerary.days.len(), 3);
        }
        other => panic!("expected an itinerary, got {:?}", other),
    }
    assert!(done.cycle.bound_trip_id.is_some());

    let session = fx.sessions.current().unwrap();
    let records = fx.gateway.list_by_owner(&session).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mode(), Mode::Itinerary);
    assert_eq!(records[0].source_url.as_deref(), Some("https://pin.it/abc123"));
    assert_eq!(records[0].owner_id, "alice");
    assert_eq!(Some(&records[0].id), done.cycle.bound_trip_id.as_ref());
}

#[tokio::test]
async fn test_model_failure_returns_home_without_saving() {
    let fx = fixture(vec![Err(LlmError::ApiError {
        status: 503,
        message: "unavailable".to_string(),
    })]);

    fx.handle.startup().await.unwrap();
    fx.handle.submit_link("https://pin.it/abc123").await.unwrap();
    fx.handle.select_mode(Mode::Board).await.unwrap();

    let done = wait_for(&fx.handle, |s| !s.view.is_generating()).await;
    assert_eq!(done.view, View::Home);
    assert!(done.cycle.input.is_none());

    let session = fx.sessions.current().unwrap();
    assert!(fx.gateway.list_by_owner(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_saved_trip_can_be_reopened_and_deleted() {
    let fx = fixture(vec![Ok(GenerateResponse::text(PORTO))]);

    fx.handle.startup().await.unwrap();
    fx.handle.submit_link("https://pin.it/abc123").await.unwrap();
    fx.handle.select_mode(Mode::Itinerary).await.unwrap();
    wait_for(&fx.handle, |s| s.cycle.save_status == SaveStatus::Saved).await;

    fx.handle.reset().await.unwrap();
    let listed = fx.handle.show_saved().await.unwrap();
    let id = match &listed.view {
        View::SavedList {
            listing: SavedListing::Loaded(records),
        } => {
            assert_eq!(records.len(), 1);
            records[0].id.clone()
        }
        other => panic!("expected a loaded list, got {:?}", other),
    };

    let opened = fx.handle.select_saved(id.clone()).await.unwrap();
    assert!(matches!(opened.view, View::Result { .. }));
    assert_eq!(opened.cycle.bound_trip_id.as_ref(), Some(&id));

    fx.handle.reset().await.unwrap();
    fx.handle.show_saved().await.unwrap();
    assert!(fx.handle.delete_saved(id).await.unwrap());

    let session = fx.sessions.current().unwrap();
    assert!(fx.gateway.list_by_owner(&session).await.unwrap().is_empty());
}
