//! ControllerHandle - actor that owns a Controller
//!
//! Intents are processed one at a time. Model calls and the store writes that
//! follow them run in their own tasks and come back as `Finished` messages, so
//! intents handled in the meantime are never held up and can make a late
//! outcome stale. The session is checked for expiry on a fixed interval.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::messages::{Finished, Intent, IntentReply};
use super::{Applied, Controller, ControllerError, ControllerEvent, PendingGeneration, PendingSave, Snapshot};
use crate::domain::{ImagePayload, Mode, Preferences, TripId};
use crate::session::SessionEvent;

/// How often a running controller looks for an expired session
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to send intents to the controller actor
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Intent>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl ControllerHandle {
    /// Spawn the actor. Must be called inside a tokio runtime.
    pub fn spawn(controller: Controller) -> Self {
        Self::spawn_with_expiry_check(controller, SESSION_CHECK_INTERVAL)
    }

    /// Spawn the actor, checking the session for expiry every `check_every`
    pub fn spawn_with_expiry_check(controller: Controller, check_every: Duration) -> Self {
        debug!(?check_every, "ControllerHandle::spawn_with_expiry_check: called");
        let (tx, rx) = mpsc::channel(64);
        let event_tx = controller.event_sender();
        tokio::spawn(actor_loop(controller, rx, check_every));
        info!("Controller actor spawned");
        Self { tx, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    async fn request(&self, make: impl FnOnce(IntentReply) -> Intent) -> Result<Snapshot, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ControllerError::ChannelError)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelError)?
    }

    pub async fn startup(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::Startup { reply }).await
    }

    pub async fn grant_permission(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::GrantPermission { reply }).await
    }

    pub async fn submit_image(&self, image: ImagePayload) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::SubmitImage { image, reply }).await
    }

    pub async fn submit_link(&self, link: impl Into<String>) -> Result<Snapshot, ControllerError> {
        let link = link.into();
        self.request(|reply| Intent::SubmitLink { link, reply }).await
    }

    /// Start generating; the result arrives later as a `ViewChanged` event
    pub async fn select_mode(&self, mode: Mode) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::SelectMode { mode, reply }).await
    }

    pub async fn dismiss_mode_selection(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::DismissModeSelection { reply }).await
    }

    pub async fn edit(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::Edit { reply }).await
    }

    pub async fn set_preference(&self, assignment: impl Into<String>) -> Result<Snapshot, ControllerError> {
        let assignment = assignment.into();
        self.request(|reply| Intent::SetPreference { assignment, reply }).await
    }

    /// Start regenerating; the result arrives later as a `ViewChanged` event
    pub async fn submit_preferences(&self, preferences: Preferences) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::SubmitPreferences { preferences, reply })
            .await
    }

    pub async fn cancel_preferences(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::CancelPreferences { reply }).await
    }

    pub async fn reset(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::Reset { reply }).await
    }

    pub async fn show_saved(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::ShowSaved { reply }).await
    }

    pub async fn back_home(&self) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::BackHome { reply }).await
    }

    pub async fn select_saved(&self, id: TripId) -> Result<Snapshot, ControllerError> {
        self.request(|reply| Intent::SelectSaved { id, reply }).await
    }

    pub async fn delete_saved(&self, id: TripId) -> Result<bool, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Intent::DeleteSaved { id, reply: reply_tx })
            .await
            .map_err(|_| ControllerError::ChannelError)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelError)?
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Intent::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| ControllerError::ChannelError)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelError)
    }
}

/// Run the model call off the actor and report back
fn spawn_generation(controller: &Controller, pending: PendingGeneration, done_tx: mpsc::UnboundedSender<Finished>) {
    let service = controller.generation_service();
    debug!(epoch = pending.epoch(), mode = %pending.mode, "spawn_generation: called");
    tokio::spawn(async move {
        let outcome = pending.run(&service).await;
        if done_tx.send(Finished::Generation { pending, outcome }).is_err() {
            debug!("spawn_generation: controller gone, dropping outcome");
        }
    });
}

/// Run the store write off the actor and report back
fn spawn_save(controller: &Controller, pending: PendingSave, done_tx: mpsc::UnboundedSender<Finished>) {
    let gateway = controller.gateway();
    debug!(mode = %pending.mode, update = pending.is_update(), "spawn_save: called");
    tokio::spawn(async move {
        let outcome = pending.run(gateway.as_ref()).await;
        if done_tx.send(Finished::Save { pending, outcome }).is_err() {
            debug!("spawn_save: controller gone, dropping outcome");
        }
    });
}

fn check_session_expiry(controller: &Controller) {
    match controller.sessions().check_expiry() {
        // The provider announces it; the subscription arm routes the controller
        Ok(true) => info!("Session expired while running"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Failed to clear expired session"),
    }
}

/// The actor loop that processes intents, finished generations and session changes
async fn actor_loop(mut controller: Controller, mut rx: mpsc::Receiver<Intent>, check_every: Duration) {
    debug!("actor_loop: started");
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Finished>();
    let mut sessions = controller.sessions().subscribe();
    let mut sessions_open = true;
    let mut expiry = tokio::time::interval(check_every);
    expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            intent = rx.recv() => {
                let Some(intent) = intent else {
                    debug!("actor_loop: all handles dropped");
                    break;
                };
                handle_intent(&mut controller, intent, &done_tx).await;
            }
            Some(finished) = done_rx.recv() => match finished {
                Finished::Generation { pending, outcome } => {
                    if let Applied::Shown(Some(save)) = controller.apply_generation(pending, outcome) {
                        spawn_save(&controller, save, done_tx.clone());
                    }
                }
                Finished::Save { pending, outcome } => {
                    controller.complete_save(pending, outcome);
                }
            },
            _ = expiry.tick() => check_session_expiry(&controller),
            event = sessions.recv(), if sessions_open => match event {
                Ok(event) => controller.on_session_event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Only the latest state matters; re-read it
                    warn!(skipped = n, "actor_loop: session events lagged");
                    let event = match controller.sessions().current() {
                        Some(session) => SessionEvent::SignedIn(session),
                        None => SessionEvent::SignedOut,
                    };
                    controller.on_session_event(event);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("actor_loop: session channel closed");
                    sessions_open = false;
                }
            },
        }
    }

    info!("Controller actor stopped");
}

async fn handle_intent(controller: &mut Controller, intent: Intent, done_tx: &mpsc::UnboundedSender<Finished>) {
    match intent {
        Intent::Startup { reply } => {
            controller.startup();
            let _ = reply.send(Ok(controller.snapshot()));
        }
        Intent::GrantPermission { reply } => {
            let result = controller.grant_permission().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SubmitImage { image, reply } => {
            let result = controller.submit_image(image).map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SubmitLink { link, reply } => {
            let result = controller.submit_link(&link).map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SelectMode { mode, reply } => {
            let result = controller.begin_mode(mode).map(|pending| {
                spawn_generation(controller, pending, done_tx.clone());
                controller.snapshot()
            });
            let _ = reply.send(result);
        }
        Intent::DismissModeSelection { reply } => {
            let result = controller.dismiss_mode_selection().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::Edit { reply } => {
            let result = controller.edit().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SetPreference { assignment, reply } => {
            let result = controller.set_preference(&assignment).map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SubmitPreferences { preferences, reply } => {
            let result = controller.begin_regeneration(preferences).map(|pending| {
                spawn_generation(controller, pending, done_tx.clone());
                controller.snapshot()
            });
            let _ = reply.send(result);
        }
        Intent::CancelPreferences { reply } => {
            let result = controller.cancel_preferences().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::Reset { reply } => {
            let result = controller.reset().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::ShowSaved { reply } => {
            let result = controller.show_saved().await.map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::BackHome { reply } => {
            let result = controller.back_home().map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::SelectSaved { id, reply } => {
            let result = controller.select_saved(&id).map(|_| controller.snapshot());
            let _ = reply.send(result);
        }
        Intent::DeleteSaved { id, reply } => {
            let _ = reply.send(controller.delete_saved(&id).await);
        }
        Intent::Snapshot { reply } => {
            let _ = reply.send(controller.snapshot());
        }
    }
}
