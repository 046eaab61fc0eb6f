//! Workflow controller
//!
//! Owns the current view and the data of the trip cycle in progress. Every
//! public operation is one transition; calling it from a view that does not
//! accept it returns `InvalidTransition` and leaves state untouched.
//!
//! Generation is split in two so a driver can run the model call elsewhere:
//! `begin_*` moves to `Generating` and hands back a `PendingGeneration`, and
//! `complete_generation` applies the outcome only if nothing has moved the
//! controller on in the meantime. Saving the result is split the same way:
//! `apply_generation` shows the result and hands back a `PendingSave`, and
//! `complete_save` records the written id if the cycle is still the same.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{ControllerError, ControllerEvent, Cycle, SaveStatus, SavedListing, SignOutReason, Snapshot, View};
use crate::domain::{
    GeneratedResult, IMAGE_UPLOAD_LABEL, ImagePayload, InputReference, Mode, NewTrip, Preferences, TripId, TripRecord,
    TripUpdate,
};
use crate::flags::FlagStore;
use crate::gateway::{GatewayError, TripGateway};
use crate::generation::{GenerationError, GenerationService};
use crate::session::{Session, SessionEvent, SessionProvider};

/// Capacity of the controller event channel
const EVENT_CAPACITY: usize = 64;

/// Alert shown when a generation fails for any reason
pub const GENERATION_FAILED_ALERT: &str = "Something went wrong with the AI generation. Please try again.";

pub type GenerationOutcome = Result<GeneratedResult, GenerationError>;

pub type SaveOutcome = Result<TripId, GatewayError>;

/// A generation that has started but whose outcome is not yet applied
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    epoch: u64,
    pub input: InputReference,
    pub preferences: Preferences,
    pub mode: Mode,
    /// Always insert a new record rather than update the bound one
    pub is_new: bool,
}

impl PendingGeneration {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Run the model call for this generation
    pub async fn run(&self, service: &GenerationService) -> GenerationOutcome {
        service.generate(&self.input, &self.preferences, self.mode).await
    }
}

/// The store write that follows a successful generation
#[derive(Debug, Clone)]
pub struct PendingSave {
    epoch: u64,
    cycle: u64,
    session: Session,
    pub mode: Mode,
    write: SaveWrite,
}

#[derive(Debug, Clone)]
enum SaveWrite {
    Insert(NewTrip),
    Update(TripId, TripUpdate),
}

impl PendingSave {
    pub fn is_update(&self) -> bool {
        matches!(self.write, SaveWrite::Update(..))
    }

    /// Write to the store, returning the record's id
    pub async fn run(&self, gateway: &dyn TripGateway) -> SaveOutcome {
        match &self.write {
            SaveWrite::Insert(trip) => gateway.insert(&self.session, trip.clone()).await,
            SaveWrite::Update(id, update) => gateway
                .update(&self.session, id, update.clone())
                .await
                .map(|_| id.clone()),
        }
    }
}

/// What applying a generation outcome led to
#[derive(Debug)]
pub enum Applied {
    /// Something moved the controller on; the outcome was dropped
    Stale,
    /// The generation failed and the cycle was abandoned
    Failed,
    /// The result is on screen; a save is due unless there was no session
    Shown(Option<PendingSave>),
}

pub struct Controller {
    generation: Arc<GenerationService>,
    gateway: Arc<dyn TripGateway>,
    sessions: Arc<dyn SessionProvider>,
    flags: Arc<dyn FlagStore>,
    view: View,
    cycle: Cycle,
    /// Bumped whenever a generation starts or the cycle is abandoned
    epoch: u64,
    /// Bumped whenever the cycle is replaced; a late save still binds its id within the same cycle
    cycle_id: u64,
    events: broadcast::Sender<ControllerEvent>,
}

impl Controller {
    pub fn new(
        generation: Arc<GenerationService>,
        gateway: Arc<dyn TripGateway>,
        sessions: Arc<dyn SessionProvider>,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        debug!("Controller::new: called");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            generation,
            gateway,
            sessions,
            flags,
            view: View::Unauthenticated {
                reason: SignOutReason::NoSession,
            },
            cycle: Cycle::default(),
            epoch: 0,
            cycle_id: 0,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<ControllerEvent> {
        self.events.clone()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            view: self.view.clone(),
            cycle: self.cycle.clone(),
        }
    }

    pub fn generation_service(&self) -> Arc<GenerationService> {
        self.generation.clone()
    }

    pub fn sessions(&self) -> Arc<dyn SessionProvider> {
        self.sessions.clone()
    }

    pub fn gateway(&self) -> Arc<dyn TripGateway> {
        self.gateway.clone()
    }

    fn emit(&self, event: ControllerEvent) {
        debug!(event_type = event.event_type(), "Controller::emit");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_view(&mut self, view: View) {
        debug!(from = self.view.name(), to = view.name(), "set_view: called");
        self.view = view;
        self.emit(ControllerEvent::ViewChanged(self.view.clone()));
    }

    fn set_save_status(&mut self, status: SaveStatus) {
        if self.cycle.save_status != status {
            self.cycle.save_status = status;
            self.emit(ControllerEvent::SaveStatusChanged(status));
        }
    }

    fn alert(&self, message: impl Into<String>) {
        self.emit(ControllerEvent::Alert {
            message: message.into(),
        });
    }

    fn invalid(&self, action: &'static str) -> ControllerError {
        debug!(from = self.view.name(), action, "invalid transition");
        ControllerError::InvalidTransition {
            from: self.view.name(),
            action,
        }
    }

    /// Drop the cycle and invalidate any generation in flight
    fn clear_cycle(&mut self) {
        self.epoch += 1;
        self.cycle_id += 1;
        let status = self.cycle.save_status;
        self.cycle = Cycle::default();
        if status != SaveStatus::Idle {
            self.emit(ControllerEvent::SaveStatusChanged(SaveStatus::Idle));
        }
    }

    /// Pick the entry view for the current session
    fn route(&mut self, reason: SignOutReason) {
        let view = match self.sessions.current() {
            None => View::Unauthenticated { reason },
            Some(_) if self.flags.permission_granted() => View::Home,
            Some(_) => View::AwaitingPermission,
        };
        self.set_view(view);
    }

    /// Resolve the session and show the first screen
    pub fn startup(&mut self) -> &View {
        debug!("startup: called");
        match self.sessions.check_expiry() {
            Ok(true) => info!("Stored session had expired"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to clear expired session"),
        }
        self.route(SignOutReason::NoSession);
        info!(view = self.view.name(), "Controller started");
        &self.view
    }

    pub fn grant_permission(&mut self) -> Result<(), ControllerError> {
        if !matches!(self.view, View::AwaitingPermission) {
            return Err(self.invalid("grant permission"));
        }
        if let Err(e) = self.flags.grant_permission() {
            warn!(error = %e, "Failed to persist sharing permission");
            self.alert(format!("Could not remember the permission: {}", e));
        }
        self.set_view(View::Home);
        Ok(())
    }

    pub fn submit_image(&mut self, image: ImagePayload) -> Result<(), ControllerError> {
        self.capture(InputReference::Image(image), "submit an image")
    }

    pub fn submit_link(&mut self, link: &str) -> Result<(), ControllerError> {
        if !matches!(self.view, View::Home) {
            return Err(self.invalid("submit a link"));
        }
        let input = InputReference::link(link)?;
        self.capture(input, "submit a link")
    }

    fn capture(&mut self, input: InputReference, action: &'static str) -> Result<(), ControllerError> {
        if !matches!(self.view, View::Home) {
            return Err(self.invalid(action));
        }
        debug!(is_link = input.as_link().is_some(), "capture: called");
        let preview = input.preview();
        // Replaces whichever kind was held before
        self.cycle.input = Some(input);
        self.set_view(View::ModeSelection { preview });
        Ok(())
    }

    /// Choose a mode and generate straight away with default preferences
    pub async fn select_mode(&mut self, mode: Mode) -> Result<(), ControllerError> {
        let pending = self.begin_mode(mode)?;
        let outcome = pending.run(&self.generation).await;
        self.complete_generation(pending, outcome).await;
        Ok(())
    }

    /// First half of `select_mode`
    pub fn begin_mode(&mut self, mode: Mode) -> Result<PendingGeneration, ControllerError> {
        if !matches!(self.view, View::ModeSelection { .. }) {
            return Err(self.invalid("select a mode"));
        }
        self.begin_generation(Preferences::default(), mode, true)
    }

    /// Closing the mode chooser abandons the input
    pub fn dismiss_mode_selection(&mut self) -> Result<(), ControllerError> {
        if !matches!(self.view, View::ModeSelection { .. }) {
            return Err(self.invalid("dismiss mode selection"));
        }
        self.reset()
    }

    pub fn edit(&mut self) -> Result<(), ControllerError> {
        let View::Result { result } = &self.view else {
            return Err(self.invalid("edit preferences"));
        };
        let view = View::Preferences {
            draft: self.cycle.preferences.clone(),
            preview: self.cycle.input.as_ref().map(InputReference::preview),
            result: result.clone(),
        };
        self.set_view(view);
        Ok(())
    }

    /// Change one field of the preferences draft, e.g. `days=5`
    pub fn set_preference(&mut self, assignment: &str) -> Result<(), ControllerError> {
        if !matches!(self.view, View::Preferences { .. }) {
            return Err(self.invalid("change preferences"));
        }
        if let View::Preferences { draft, .. } = &mut self.view {
            draft.apply_assignment(assignment)?;
        }
        self.emit(ControllerEvent::ViewChanged(self.view.clone()));
        Ok(())
    }

    /// Regenerate with edited preferences, updating the bound record
    pub async fn submit_preferences(&mut self, prefs: Preferences) -> Result<(), ControllerError> {
        let pending = self.begin_regeneration(prefs)?;
        let outcome = pending.run(&self.generation).await;
        self.complete_generation(pending, outcome).await;
        Ok(())
    }

    /// First half of `submit_preferences`
    pub fn begin_regeneration(&mut self, prefs: Preferences) -> Result<PendingGeneration, ControllerError> {
        let View::Preferences { result, .. } = &self.view else {
            return Err(self.invalid("submit preferences"));
        };
        let mode = result.mode();
        self.begin_generation(prefs, mode, false)
    }

    pub fn cancel_preferences(&mut self) -> Result<(), ControllerError> {
        let View::Preferences { result, .. } = &self.view else {
            return Err(self.invalid("cancel editing"));
        };
        let result = result.clone();
        self.set_view(View::Result { result });
        Ok(())
    }

    /// Start a generation from the mode chooser or the preferences editor
    pub fn begin_generation(
        &mut self,
        prefs: Preferences,
        mode: Mode,
        is_new: bool,
    ) -> Result<PendingGeneration, ControllerError> {
        debug!(%mode, is_new, "begin_generation: called");
        if !matches!(self.view, View::ModeSelection { .. } | View::Preferences { .. }) {
            return Err(self.invalid("generate"));
        }
        prefs.validate()?;
        let input = self.cycle.input.clone().ok_or(ControllerError::MissingInput)?;

        self.epoch += 1;
        self.cycle.mode = Some(mode);
        self.cycle.preferences = prefs.clone();
        self.set_save_status(SaveStatus::Idle);
        self.set_view(View::Generating { mode });
        info!(epoch = self.epoch, %mode, is_new, "Generation started");

        Ok(PendingGeneration {
            epoch: self.epoch,
            input,
            preferences: prefs,
            mode,
            is_new,
        })
    }

    /// Apply a generation outcome and run its save inline
    ///
    /// Returns false when the outcome was stale and dropped.
    pub async fn complete_generation(&mut self, pending: PendingGeneration, outcome: GenerationOutcome) -> bool {
        match self.apply_generation(pending, outcome) {
            Applied::Stale => false,
            Applied::Failed | Applied::Shown(None) => true,
            Applied::Shown(Some(save)) => {
                let gateway = self.gateway.clone();
                let outcome = save.run(gateway.as_ref()).await;
                self.complete_save(save, outcome);
                true
            }
        }
    }

    /// Apply a generation outcome without waiting on the store
    pub fn apply_generation(&mut self, pending: PendingGeneration, outcome: GenerationOutcome) -> Applied {
        debug!(epoch = pending.epoch, ok = outcome.is_ok(), "apply_generation: called");
        if pending.epoch != self.epoch || !self.view.is_generating() {
            info!(
                epoch = pending.epoch,
                current_epoch = self.epoch,
                view = self.view.name(),
                "Discarding stale generation outcome"
            );
            if let Err(e) = &outcome {
                warn!(error = %e, "Stale generation had failed");
            }
            return Applied::Stale;
        }

        match outcome {
            Err(e) => {
                error!(error = %e, mode = %pending.mode, transient = e.is_transient(), "AI generation failed");
                self.clear_cycle();
                self.alert(GENERATION_FAILED_ALERT);
                self.set_view(View::Home);
                Applied::Failed
            }
            Ok(result) => {
                let save = self.prepare_save(&pending, &result);
                self.set_view(View::Result { result });
                Applied::Shown(save)
            }
        }
    }

    /// Insert on the first save of a cycle, update the bound record after that
    fn prepare_save(&mut self, pending: &PendingGeneration, result: &GeneratedResult) -> Option<PendingSave> {
        let Some(session) = self.sessions.current() else {
            warn!("No session found, skipping save");
            self.set_save_status(SaveStatus::Error);
            return None;
        };

        let write = match self.cycle.bound_trip_id.clone().filter(|_| !pending.is_new) {
            Some(id) => {
                debug!(%id, "prepare_save: updating bound trip");
                SaveWrite::Update(
                    id,
                    TripUpdate {
                        preferences: pending.preferences.clone(),
                        result: result.clone(),
                    },
                )
            }
            None => {
                debug!("prepare_save: inserting new trip");
                SaveWrite::Insert(NewTrip {
                    source_url: Some(pending.input.source_label()),
                    preferences: pending.preferences.clone(),
                    result: result.clone(),
                })
            }
        };

        self.set_save_status(SaveStatus::Saving);
        Some(PendingSave {
            epoch: self.epoch,
            cycle: self.cycle_id,
            session,
            mode: pending.mode,
            write,
        })
    }

    /// Record the outcome of a save. Returns false when its cycle is gone.
    pub fn complete_save(&mut self, pending: PendingSave, outcome: SaveOutcome) -> bool {
        debug!(epoch = pending.epoch, cycle = pending.cycle, ok = outcome.is_ok(), "complete_save: called");
        if pending.cycle != self.cycle_id {
            match &outcome {
                Ok(id) => info!(%id, "Trip saved after its cycle ended"),
                Err(e) => warn!(error = %e, "Save for an abandoned cycle failed"),
            }
            return false;
        }

        // A newer generation owns the status indicator
        let current = pending.epoch == self.epoch;
        match outcome {
            Ok(id) => {
                info!(%id, mode = %pending.mode, "Trip saved");
                self.cycle.bound_trip_id = Some(id);
                if current {
                    self.set_save_status(SaveStatus::Saved);
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to save trip");
                self.alert(format!("Database error: {}", e));
                if current {
                    self.set_save_status(SaveStatus::Error);
                }
            }
        }
        true
    }

    /// Back to an empty home screen from anywhere behind sign-in
    pub fn reset(&mut self) -> Result<(), ControllerError> {
        if !self.view.is_signed_in() {
            return Err(self.invalid("reset"));
        }
        debug!(from = self.view.name(), "reset: called");
        self.clear_cycle();
        self.set_view(View::Home);
        Ok(())
    }

    /// Load the owner's trips, newest first
    pub async fn show_saved(&mut self) -> Result<(), ControllerError> {
        if !matches!(self.view, View::Home) {
            return Err(self.invalid("show saved trips"));
        }
        let listing = match self.sessions.current() {
            None => {
                warn!("show_saved: no session");
                SavedListing::Failed("Not signed in".to_string())
            }
            Some(session) => match self.gateway.list_by_owner(&session).await {
                Ok(records) => {
                    debug!(count = records.len(), "show_saved: loaded");
                    SavedListing::Loaded(records)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load saved trips");
                    SavedListing::Failed(e.to_string())
                }
            },
        };
        self.set_view(View::SavedList { listing });
        Ok(())
    }

    pub fn back_home(&mut self) -> Result<(), ControllerError> {
        if !matches!(self.view, View::SavedList { .. }) {
            return Err(self.invalid("go back home"));
        }
        self.set_view(View::Home);
        Ok(())
    }

    fn listed(&self, id: &TripId, action: &'static str) -> Result<&TripRecord, ControllerError> {
        let View::SavedList {
            listing: SavedListing::Loaded(records),
        } = &self.view
        else {
            return Err(self.invalid(action));
        };
        records
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| ControllerError::UnknownTrip(id.to_string()))
    }

    /// Open a stored trip as if it had just been generated
    pub fn select_saved(&mut self, id: &TripId) -> Result<(), ControllerError> {
        let record = self.listed(id, "open a saved trip")?.clone();
        info!(%id, mode = %record.mode(), "Opening saved trip");

        self.epoch += 1;
        self.cycle_id += 1;
        // Links can be regenerated from; uploaded image bytes are not stored
        let input = record
            .source_url
            .filter(|url| url != IMAGE_UPLOAD_LABEL)
            .and_then(|url| InputReference::link(url).ok());
        self.cycle = Cycle {
            input,
            mode: Some(record.result.mode()),
            preferences: record.preferences,
            bound_trip_id: Some(record.id),
            save_status: SaveStatus::Saved,
        };
        self.emit(ControllerEvent::SaveStatusChanged(SaveStatus::Saved));
        self.set_view(View::Result { result: record.result });
        Ok(())
    }

    /// Delete a listed trip. Returns false when the store refused; the list is then unchanged.
    pub async fn delete_saved(&mut self, id: &TripId) -> Result<bool, ControllerError> {
        self.listed(id, "delete a saved trip")?;

        let Some(session) = self.sessions.current() else {
            warn!(%id, "delete_saved: no session");
            self.alert("Could not delete: not signed in");
            return Ok(false);
        };

        if let Err(e) = self.gateway.delete(&session, id).await {
            warn!(%id, error = %e, "Failed to delete trip");
            self.alert(format!("Could not delete: {}", e));
            return Ok(false);
        }

        info!(%id, "Deleted trip");
        if let View::SavedList {
            listing: SavedListing::Loaded(records),
        } = &mut self.view
        {
            records.retain(|r| &r.id != id);
        }
        self.emit(ControllerEvent::ViewChanged(self.view.clone()));
        Ok(true)
    }

    /// React to a session change from the identity provider
    ///
    /// Sign-out and expiry both drop all trip state; the view records which one it was.
    pub fn on_session_event(&mut self, event: SessionEvent) {
        debug!(?event, "on_session_event: called");
        match event {
            SessionEvent::SignedIn(session) => {
                info!(owner_id = %session.owner_id, "Session started");
                self.clear_cycle();
                self.route(SignOutReason::NoSession);
            }
            SessionEvent::SignedOut => {
                info!("Session ended by sign-out");
                self.clear_cycle();
                self.set_view(View::Unauthenticated {
                    reason: SignOutReason::SignedOut,
                });
            }
            SessionEvent::Expired => {
                info!("Session expired");
                self.clear_cycle();
                self.set_view(View::Unauthenticated {
                    reason: SignOutReason::Expired,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Budget, ItineraryResult};
    use crate::flags::MemoryFlagStore;
    use crate::gateway::mock::{Call, MockGateway};
    use crate::generation::PromptLoader;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{GenerateResponse, LlmError};
    use crate::session::{MemorySessionProvider, Session};

    const LINK: &str = "https://pin.it/abc123";

    fn itinerary_text(title: &str, days: u32) -> String {
        let days: Vec<serde_json::Value> = (1..=days)
            .map(|d| serde_json::json!({"day": d, "theme": format!("Day {}", d), "activities": []}))
            .collect();
        serde_json::json!({
            "title": title,
            "destination": "Kyoto",
            "totalEstimatedCost": "$1200",
            "days": days,
        })
        .to_string()
    }

    fn board_text(title: &str) -> String {
        serde_json::json!({
            "title": title,
            "concept": "Quiet mornings",
            "scenes": [{"id": 1, "title": "Tea", "visualDescription": "Steam", "aestheticNote": "Muted", "mood": "Calm"}],
        })
        .to_string()
    }

    struct Harness {
        controller: Controller,
        llm: Arc<MockLlmClient>,
        gateway: Arc<MockGateway>,
        sessions: Arc<MemorySessionProvider>,
        flags: Arc<MemoryFlagStore>,
    }

    fn harness_with(llm: MockLlmClient, gateway: MockGateway, session: Option<&str>, granted: bool) -> Harness {
        let llm = Arc::new(llm);
        let gateway = Arc::new(gateway);
        let sessions = Arc::new(MemorySessionProvider::new(session.map(Session::new)));
        let flags = Arc::new(MemoryFlagStore::new(granted));
        let service = Arc::new(GenerationService::new(llm.clone(), PromptLoader::embedded_only()));
        let controller = Controller::new(service, gateway.clone(), sessions.clone(), flags.clone());
        Harness {
            controller,
            llm,
            gateway,
            sessions,
            flags,
        }
    }

    fn llm(replies: &[String]) -> MockLlmClient {
        let texts: Vec<&str> = replies.iter().map(String::as_str).collect();
        MockLlmClient::with_texts(&texts)
    }

    fn harness(replies: &[String]) -> Harness {
        let mut h = harness_with(llm(replies), MockGateway::default(), Some("alice"), true);
        h.controller.startup();
        h
    }

    fn png() -> ImagePayload {
        ImagePayload::new(vec![0x89, 0x50, 0x4e, 0x47], "image/png").unwrap()
    }

    fn saved_record(id: &str, prefs: Preferences) -> TripRecord {
        TripRecord {
            id: TripId::new(id),
            created_at: chrono::Utc::now(),
            source_url: Some(LINK.to_string()),
            preferences: prefs,
            result: GeneratedResult::from_value(
                Mode::Board,
                serde_json::from_str(&board_text("Stored Board")).unwrap(),
            )
            .unwrap(),
            owner_id: "alice".to_string(),
        }
    }

    /// Drive a fresh cycle from Home to a Result
    async fn generate_link(h: &mut Harness, mode: Mode) {
        h.controller.submit_link(LINK).unwrap();
        h.controller.select_mode(mode).await.unwrap();
    }

    #[test]
    fn test_startup_routes_by_session_and_permission() {
        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), None, true);
        assert_eq!(
            h.controller.startup(),
            &View::Unauthenticated {
                reason: SignOutReason::NoSession
            }
        );

        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), Some("alice"), false);
        assert_eq!(h.controller.startup(), &View::AwaitingPermission);

        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), Some("alice"), true);
        assert_eq!(h.controller.startup(), &View::Home);
    }

    #[test]
    fn test_grant_permission_persists_flag() {
        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), Some("alice"), false);
        h.controller.startup();

        h.controller.grant_permission().unwrap();
        assert_eq!(h.controller.view(), &View::Home);
        assert!(h.flags.permission_granted());

        // Not offered again
        assert!(matches!(
            h.controller.grant_permission(),
            Err(ControllerError::InvalidTransition { from: "home", .. })
        ));
    }

    #[test]
    fn test_submit_replaces_previous_input_kind() {
        let mut h = harness(&[]);
        h.controller.submit_image(png()).unwrap();
        assert!(matches!(h.controller.view(), View::ModeSelection { preview } if preview.starts_with("data:image/png")));

        h.controller.dismiss_mode_selection().unwrap();
        h.controller.submit_link(LINK).unwrap();
        assert_eq!(h.controller.cycle().input, Some(InputReference::Link(LINK.to_string())));
        assert_eq!(
            h.controller.view(),
            &View::ModeSelection {
                preview: LINK.to_string()
            }
        );
    }

    #[test]
    fn test_blank_link_rejected_without_transition() {
        let mut h = harness(&[]);
        assert!(matches!(h.controller.submit_link("  "), Err(ControllerError::Input(_))));
        assert_eq!(h.controller.view(), &View::Home);
        assert!(h.controller.cycle().input.is_none());
    }

    #[tokio::test]
    async fn test_link_itinerary_end_to_end() {
        let mut h = harness(&[itinerary_text("Kyoto Slow Days", 3)]);
        let mut events = h.controller.subscribe();

        generate_link(&mut h, Mode::Itinerary).await;

        let snapshot = h.controller.snapshot();
        let Some(GeneratedResult::Itinerary(ItineraryResult { days, .. })) = snapshot.result() else {
            panic!("expected itinerary result, got {:?}", snapshot.view);
        };
        assert_eq!(days.len(), 3);
        assert_eq!(snapshot.cycle.save_status, SaveStatus::Saved);

        let records = h.gateway.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mode(), Mode::Itinerary);
        assert_eq!(records[0].source_url.as_deref(), Some(LINK));
        assert_eq!(snapshot.cycle.bound_trip_id, Some(records[0].id.clone()));

        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ControllerEvent::SaveStatusChanged(status) = event {
                statuses.push(status);
            }
        }
        assert_eq!(statuses, vec![SaveStatus::Saving, SaveStatus::Saved]);
    }

    #[tokio::test]
    async fn test_select_mode_resets_preferences_to_default() {
        let mut h = harness(&[board_text("First"), board_text("Second"), board_text("Third")]);
        generate_link(&mut h, Mode::Board).await;

        h.controller.edit().unwrap();
        let edited = Preferences {
            budget: Budget::Luxury,
            days: 6,
            travelers: "Solo".to_string(),
            vibe: "Nightlife".to_string(),
        };
        h.controller.submit_preferences(edited.clone()).await.unwrap();
        assert_eq!(h.controller.cycle().preferences, edited);

        h.controller.reset().unwrap();
        generate_link(&mut h, Mode::Board).await;
        assert_eq!(h.controller.cycle().preferences, Preferences::default());

        let prompt = h.llm.requests()[2].prompt_text();
        assert!(prompt.contains("Couple"));
        assert!(prompt.contains("Moderate"));
        assert!(!prompt.contains("Nightlife"));
    }

    #[tokio::test]
    async fn test_regeneration_updates_bound_trip() {
        let mut h = harness(&[itinerary_text("First", 3), itinerary_text("Second", 5)]);
        generate_link(&mut h, Mode::Itinerary).await;
        let bound = h.controller.cycle().bound_trip_id.clone().unwrap();

        h.controller.edit().unwrap();
        h.controller.set_preference("days=5").unwrap();
        let View::Preferences { draft, .. } = h.controller.view().clone() else {
            panic!("expected preferences view");
        };
        h.controller.submit_preferences(draft).await.unwrap();

        let calls = h.gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Call::Insert(_)));
        assert!(matches!(&calls[1], Call::Update(id, update) if id == &bound && update.preferences.days == 5));
        assert_eq!(h.gateway.records().len(), 1);
        assert_eq!(h.controller.cycle().bound_trip_id, Some(bound));
        assert_eq!(h.controller.snapshot().result().unwrap().title(), "Second");
    }

    #[tokio::test]
    async fn test_new_cycle_inserts_again_after_reset() {
        let mut h = harness(&[board_text("One"), board_text("Two")]);
        generate_link(&mut h, Mode::Board).await;
        h.controller.reset().unwrap();
        generate_link(&mut h, Mode::Board).await;

        let calls = h.gateway.calls();
        assert!(calls.iter().all(|c| matches!(c, Call::Insert(_))));
        assert_eq!(h.gateway.records().len(), 2);
    }

    #[tokio::test]
    async fn test_generation_failure_returns_home_without_record() {
        let llm = MockLlmClient::new(vec![Err(LlmError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        })]);
        let mut h = harness_with(llm, MockGateway::default(), Some("alice"), true);
        h.controller.startup();
        let mut events = h.controller.subscribe();

        generate_link(&mut h, Mode::Itinerary).await;

        assert_eq!(h.controller.view(), &View::Home);
        assert_eq!(h.controller.cycle(), &Cycle::default());
        assert!(h.gateway.calls().is_empty());

        let alerts: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                ControllerEvent::Alert { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(alerts, vec![GENERATION_FAILED_ALERT.to_string()]);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_generation_failure() {
        let mut h = harness(&["I could not open that pin, sorry.".to_string()]);
        generate_link(&mut h, Mode::Board).await;
        assert_eq!(h.controller.view(), &View::Home);
        assert!(h.gateway.records().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_still_shows_result() {
        let gateway = MockGateway::default();
        gateway.fail_writes("disk full");
        let mut h = harness_with(
            llm(&[board_text("Kept")]),
            gateway,
            Some("alice"),
            true,
        );
        h.controller.startup();
        let mut events = h.controller.subscribe();

        generate_link(&mut h, Mode::Board).await;

        assert_eq!(h.controller.snapshot().result().unwrap().title(), "Kept");
        assert_eq!(h.controller.cycle().save_status, SaveStatus::Error);
        assert!(h.controller.cycle().bound_trip_id.is_none());
        assert!(
            std::iter::from_fn(|| events.try_recv().ok())
                .any(|e| matches!(e, ControllerEvent::Alert { message } if message.contains("disk full")))
        );
    }

    #[tokio::test]
    async fn test_missing_session_marks_save_error() {
        let mut h = harness(&[board_text("Orphan")]);
        h.controller.submit_link(LINK).unwrap();
        // The session disappears without an event reaching the controller
        h.sessions.sign_out().unwrap();
        h.controller.select_mode(Mode::Board).await.unwrap();

        assert_eq!(h.controller.cycle().save_status, SaveStatus::Error);
        assert!(h.gateway.calls().is_empty());
        assert!(matches!(h.controller.view(), View::Result { .. }));
    }

    #[tokio::test]
    async fn test_cancel_preferences_keeps_result() {
        let mut h = harness(&[board_text("Unchanged")]);
        generate_link(&mut h, Mode::Board).await;
        let before = h.controller.snapshot();

        h.controller.edit().unwrap();
        h.controller.set_preference("vibe=Foodie").unwrap();
        h.controller.cancel_preferences().unwrap();

        assert_eq!(h.controller.snapshot(), before);
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_cycle_from_every_signed_in_view() {
        let mut h = harness(&[board_text("A"), board_text("B")]);

        // Home
        h.controller.reset().unwrap();
        assert_eq!(h.controller.cycle(), &Cycle::default());

        // ModeSelection
        h.controller.submit_image(png()).unwrap();
        h.controller.reset().unwrap();
        assert_eq!(h.controller.cycle(), &Cycle::default());

        // Generating
        h.controller.submit_link(LINK).unwrap();
        let pending = h.controller.begin_mode(Mode::Board).unwrap();
        h.controller.reset().unwrap();
        assert_eq!(h.controller.cycle(), &Cycle::default());
        drop(pending);

        // Result
        generate_link(&mut h, Mode::Board).await;
        h.controller.reset().unwrap();
        assert_eq!(h.controller.cycle(), &Cycle::default());
        assert!(h.controller.snapshot().result().is_none());

        // Preferences
        generate_link(&mut h, Mode::Board).await;
        h.controller.edit().unwrap();
        h.controller.set_preference("days=2").unwrap();
        h.controller.reset().unwrap();
        assert_eq!(h.controller.cycle(), &Cycle::default());

        // SavedList
        h.controller.show_saved().await.unwrap();
        h.controller.reset().unwrap();
        assert_eq!(h.controller.view(), &View::Home);
        assert_eq!(h.controller.cycle(), &Cycle::default());
    }

    #[test]
    fn test_reset_rejected_before_sign_in() {
        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), None, true);
        h.controller.startup();
        assert!(matches!(
            h.controller.reset(),
            Err(ControllerError::InvalidTransition { action: "reset", .. })
        ));
    }

    #[tokio::test]
    async fn test_select_saved_hydrates_without_generation() {
        let prefs = Preferences {
            budget: Budget::Budget,
            days: 2,
            travelers: "Friends".to_string(),
            vibe: "Foodie".to_string(),
        };
        let record = saved_record("trip-9", prefs.clone());
        let mut h = harness_with(
            MockLlmClient::with_texts(&[]),
            MockGateway::new(vec![record.clone()]),
            Some("alice"),
            true,
        );
        h.controller.startup();

        h.controller.show_saved().await.unwrap();
        h.controller.select_saved(&TripId::new("trip-9")).unwrap();

        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.view, View::Result { result: record.result });
        assert_eq!(snapshot.cycle.mode, Some(Mode::Board));
        assert_eq!(snapshot.cycle.preferences, prefs);
        assert_eq!(snapshot.cycle.bound_trip_id, Some(TripId::new("trip-9")));
        assert_eq!(snapshot.cycle.save_status, SaveStatus::Saved);
        assert_eq!(snapshot.cycle.input, Some(InputReference::Link(LINK.to_string())));
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_regenerating_saved_trip_updates_it() {
        let record = saved_record("trip-9", Preferences::default());
        let mut h = harness_with(
            llm(&[board_text("Refreshed")]),
            MockGateway::new(vec![record]),
            Some("alice"),
            true,
        );
        h.controller.startup();
        h.controller.show_saved().await.unwrap();
        h.controller.select_saved(&TripId::new("trip-9")).unwrap();

        h.controller.edit().unwrap();
        h.controller.submit_preferences(Preferences::default()).await.unwrap();

        assert!(matches!(h.gateway.calls().last(), Some(Call::Update(id, _)) if id.as_str() == "trip-9"));
        assert_eq!(h.gateway.records()[0].result.title(), "Refreshed");
    }

    #[tokio::test]
    async fn test_saved_image_trip_cannot_regenerate() {
        let mut record = saved_record("trip-3", Preferences::default());
        record.source_url = Some(IMAGE_UPLOAD_LABEL.to_string());
        let mut h = harness_with(
            MockLlmClient::with_texts(&[]),
            MockGateway::new(vec![record]),
            Some("alice"),
            true,
        );
        h.controller.startup();
        h.controller.show_saved().await.unwrap();
        h.controller.select_saved(&TripId::new("trip-3")).unwrap();
        h.controller.edit().unwrap();

        let result = h.controller.submit_preferences(Preferences::default()).await;
        assert!(matches!(result, Err(ControllerError::MissingInput)));
        assert!(matches!(h.controller.view(), View::Preferences { .. }));
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_saved_list_failure_is_inline() {
        let gateway = MockGateway::default();
        gateway.fail_reads("connection refused");
        let mut h = harness_with(MockLlmClient::with_texts(&[]), gateway, Some("alice"), true);
        h.controller.startup();

        h.controller.show_saved().await.unwrap();
        assert!(matches!(
            h.controller.view(),
            View::SavedList { listing: SavedListing::Failed(msg) } if msg.contains("connection refused")
        ));
        h.controller.back_home().unwrap();
        assert_eq!(h.controller.view(), &View::Home);
    }

    #[tokio::test]
    async fn test_delete_saved() {
        let records = vec![
            saved_record("trip-1", Preferences::default()),
            saved_record("trip-2", Preferences::default()),
        ];
        let mut h = harness_with(
            MockLlmClient::with_texts(&[]),
            MockGateway::new(records),
            Some("alice"),
            true,
        );
        h.controller.startup();
        h.controller.show_saved().await.unwrap();

        assert!(h.controller.delete_saved(&TripId::new("trip-1")).await.unwrap());
        let View::SavedList {
            listing: SavedListing::Loaded(left),
        } = h.controller.view()
        else {
            panic!("expected saved list");
        };
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id.as_str(), "trip-2");

        assert!(matches!(
            h.controller.delete_saved(&TripId::new("trip-1")).await,
            Err(ControllerError::UnknownTrip(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_list_unchanged() {
        let gateway = MockGateway::new(vec![saved_record("trip-1", Preferences::default())]);
        let mut h = harness_with(MockLlmClient::with_texts(&[]), gateway, Some("alice"), true);
        h.controller.startup();
        h.controller.show_saved().await.unwrap();
        h.gateway.fail_writes("permission denied");
        let before = h.controller.snapshot();

        assert!(!h.controller.delete_saved(&TripId::new("trip-1")).await.unwrap());
        assert_eq!(h.controller.snapshot(), before);
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let mut h = harness(&[]);
        h.controller.submit_link(LINK).unwrap();
        let pending = h.controller.begin_mode(Mode::Board).unwrap();

        // User walks away while the call is in flight
        h.controller.reset().unwrap();
        h.controller.show_saved().await.unwrap();

        let outcome = GeneratedResult::from_value(Mode::Board, serde_json::from_str(&board_text("Late")).unwrap())
            .map_err(|source| GenerationError::Shape {
                mode: Mode::Board,
                source,
            });
        assert!(!h.controller.complete_generation(pending, outcome).await);
        assert!(matches!(h.controller.view(), View::SavedList { .. }));
        assert!(h.gateway.records().is_empty());
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let mut h = harness(&[]);
        h.controller.submit_link(LINK).unwrap();
        let first = h.controller.begin_mode(Mode::Board).unwrap();
        h.controller.reset().unwrap();
        h.controller.submit_link(LINK).unwrap();
        let second = h.controller.begin_mode(Mode::Itinerary).unwrap();

        // The old board arrives while the new itinerary is still generating
        let late = GeneratedResult::from_value(Mode::Board, serde_json::from_str(&board_text("Old")).unwrap())
            .map_err(|source| GenerationError::Shape {
                mode: Mode::Board,
                source,
            });
        assert!(!h.controller.complete_generation(first, late).await);
        assert_eq!(h.controller.view(), &View::Generating { mode: Mode::Itinerary });

        let fresh = GeneratedResult::from_value(
            Mode::Itinerary,
            serde_json::from_str(&itinerary_text("New", 3)).unwrap(),
        )
        .map_err(|source| GenerationError::Shape {
            mode: Mode::Itinerary,
            source,
        });
        assert!(h.controller.complete_generation(second, fresh).await);
        assert_eq!(h.controller.snapshot().result().unwrap().title(), "New");
    }

    #[tokio::test]
    async fn test_save_landing_after_reset_leaves_new_cycle_alone() {
        let mut h = harness(&[board_text("Kept")]);
        h.controller.submit_link(LINK).unwrap();
        let pending = h.controller.begin_mode(Mode::Board).unwrap();
        let outcome = pending.run(&h.controller.generation).await;

        let Applied::Shown(Some(save)) = h.controller.apply_generation(pending, outcome) else {
            panic!("expected a save to run");
        };
        assert_eq!(h.controller.cycle().save_status, SaveStatus::Saving);
        assert!(!save.is_update());

        h.controller.reset().unwrap();
        let landed = save.run(h.controller.gateway().as_ref()).await;
        assert!(landed.is_ok());
        assert!(!h.controller.complete_save(save, landed));

        assert_eq!(h.controller.view(), &View::Home);
        assert_eq!(h.controller.cycle(), &Cycle::default());
        assert_eq!(h.gateway.records().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_and_expiry_clear_trip_state() {
        for (event, reason) in [
            (SessionEvent::SignedOut, SignOutReason::SignedOut),
            (SessionEvent::Expired, SignOutReason::Expired),
        ] {
            let mut h = harness(&[board_text("Private")]);
            generate_link(&mut h, Mode::Board).await;
            assert!(h.controller.cycle().bound_trip_id.is_some());

            h.controller.on_session_event(event);
            assert_eq!(h.controller.view(), &View::Unauthenticated { reason });
            assert_eq!(h.controller.cycle(), &Cycle::default());
            assert!(h.controller.snapshot().result().is_none());
        }
    }

    #[test]
    fn test_sign_in_event_routes_from_unauthenticated() {
        let mut h = harness_with(MockLlmClient::with_texts(&[]), MockGateway::default(), None, false);
        h.controller.startup();

        h.sessions.sign_in(Session::new("bob")).unwrap();
        h.controller.on_session_event(SessionEvent::SignedIn(Session::new("bob")));
        assert_eq!(h.controller.view(), &View::AwaitingPermission);
    }

    #[test]
    fn test_startup_drops_expired_session() {
        let mut session = Session::new("alice");
        session.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
        let sessions = Arc::new(MemorySessionProvider::new(Some(session)));
        let llm = Arc::new(MockLlmClient::with_texts(&[]));
        let service = Arc::new(GenerationService::new(llm, PromptLoader::embedded_only()));
        let mut controller = Controller::new(
            service,
            Arc::new(MockGateway::default()),
            sessions,
            Arc::new(MemoryFlagStore::new(true)),
        );

        assert_eq!(
            controller.startup(),
            &View::Unauthenticated {
                reason: SignOutReason::NoSession
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_state_untouched() {
        let mut h = harness(&[]);
        let before = h.controller.snapshot();

        assert!(h.controller.edit().is_err());
        assert!(h.controller.cancel_preferences().is_err());
        assert!(h.controller.back_home().is_err());
        assert!(h.controller.select_mode(Mode::Board).await.is_err());
        assert!(h.controller.select_saved(&TripId::new("x")).is_err());
        assert!(h.controller.submit_preferences(Preferences::default()).await.is_err());

        assert_eq!(h.controller.snapshot(), before);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_preferences_rejected_before_generation() {
        let mut h = harness(&[board_text("A")]);
        generate_link(&mut h, Mode::Board).await;
        h.controller.edit().unwrap();

        let bad = Preferences {
            days: 9,
            ..Preferences::default()
        };
        assert!(matches!(
            h.controller.submit_preferences(bad).await,
            Err(ControllerError::Preferences(_))
        ));
        assert!(matches!(h.controller.view(), View::Preferences { .. }));
        assert_eq!(h.llm.call_count(), 1);
    }
}
