//! Interactive session driving the controller actor

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::render;
use crate::controller::{ControllerError, ControllerEvent, ControllerHandle, SaveStatus, SavedListing, Snapshot, View};
use crate::domain::{ImagePayload, Mode, TripId};
use crate::session::{Session, SessionProvider};

/// One parsed line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Login(String),
    Logout,
    Grant,
    Link(String),
    Image(String),
    Mode(Mode),
    Edit,
    Set(Vec<String>),
    Submit,
    Cancel,
    Reset,
    Saved,
    Open(usize),
    Delete(usize),
    Back,
    Show,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let (cmd, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        let rest = rest.trim();

        let needs_arg = |name: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("Usage: {} <value>", name))
            } else {
                Ok(rest.to_string())
            }
        };
        let index = |name: &str| -> Result<usize, String> {
            rest.parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("Usage: {} <n> (a number from the list)", name))
        };

        match cmd.to_lowercase().as_str() {
            "login" => needs_arg("login").map(Self::Login),
            "logout" => Ok(Self::Logout),
            "grant" => Ok(Self::Grant),
            "link" => needs_arg("link").map(Self::Link),
            "image" => needs_arg("image").map(Self::Image),
            "itinerary" => Ok(Self::Mode(Mode::Itinerary)),
            "board" => Ok(Self::Mode(Mode::Board)),
            "edit" => Ok(Self::Edit),
            "set" => {
                let assignments: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
                if assignments.is_empty() {
                    return Err("Usage: set key=value [key=value ...]".to_string());
                }
                Ok(Self::Set(assignments))
            }
            "submit" => Ok(Self::Submit),
            "cancel" => Ok(Self::Cancel),
            "reset" | "close" => Ok(Self::Reset),
            "saved" | "trips" => Ok(Self::Saved),
            "open" => index("open").map(Self::Open),
            "delete" => index("delete").map(Self::Delete),
            "back" => Ok(Self::Back),
            "show" | "view" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Interactive terminal session
pub struct ReplSession {
    handle: ControllerHandle,
    sessions: Arc<dyn SessionProvider>,
    events: broadcast::Receiver<ControllerEvent>,
    last: Option<Snapshot>,
}

impl ReplSession {
    pub fn new(handle: ControllerHandle, sessions: Arc<dyn SessionProvider>) -> Self {
        let events = handle.subscribe();
        Self {
            handle,
            sessions,
            events,
            last: None,
        }
    }

    /// Run the main loop until quit or end of input
    pub async fn run(&mut self) -> Result<()> {
        println!();
        println!("{}", "PinTrip".bright_red().bold());
        println!("Type {} for help, {} to quit", "help".yellow(), "quit".yellow());
        println!();

        let snapshot = self.handle.startup().await?;
        self.show(snapshot);

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));
            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match ReplCommand::parse(input) {
                        Ok(ReplCommand::Quit) => break,
                        Ok(command) => self.dispatch(command).await?,
                        Err(message) => println!("{} {}", "?".yellow(), message),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn dispatch(&mut self, command: ReplCommand) -> Result<()> {
        debug!(?command, "dispatch: called");
        self.drain_alerts();

        let outcome = match command {
            ReplCommand::Login(user) => {
                self.sessions.sign_in(Session::new(user))?;
                self.await_view(|v| !matches!(v, View::Unauthenticated { .. })).await;
                self.handle.snapshot().await
            }
            ReplCommand::Logout => {
                self.sessions.sign_out()?;
                self.await_view(|v| matches!(v, View::Unauthenticated { .. })).await;
                self.handle.snapshot().await
            }
            ReplCommand::Grant => self.handle.grant_permission().await,
            ReplCommand::Link(link) => self.handle.submit_link(link).await,
            ReplCommand::Image(path) => match ImagePayload::from_path(&path) {
                Ok(image) => self.handle.submit_image(image).await,
                Err(e) => Err(e.into()),
            },
            ReplCommand::Mode(mode) => {
                let started = self.handle.select_mode(mode).await;
                self.generating(started).await
            }
            ReplCommand::Edit => self.handle.edit().await,
            ReplCommand::Set(assignments) => {
                let mut outcome = self.handle.snapshot().await;
                for assignment in assignments {
                    outcome = self.handle.set_preference(assignment).await;
                    if outcome.is_err() {
                        break;
                    }
                }
                outcome
            }
            ReplCommand::Submit => match self.last.as_ref().map(|s| &s.view) {
                Some(View::Preferences { draft, .. }) => {
                    let draft = draft.clone();
                    let started = self.handle.submit_preferences(draft).await;
                    self.generating(started).await
                }
                other => Err(ControllerError::InvalidTransition {
                    from: other.map(View::name).unwrap_or("unknown"),
                    action: "submit preferences",
                }),
            },
            ReplCommand::Cancel => self.handle.cancel_preferences().await,
            ReplCommand::Reset => match self.last.as_ref().map(|s| &s.view) {
                Some(View::ModeSelection { .. }) => self.handle.dismiss_mode_selection().await,
                _ => self.handle.reset().await,
            },
            ReplCommand::Saved => self.handle.show_saved().await,
            ReplCommand::Open(n) => match self.listed_id(n) {
                Some(id) => self.handle.select_saved(id).await,
                None => Err(ControllerError::UnknownTrip(format!("#{}", n))),
            },
            ReplCommand::Delete(n) => match self.listed_id(n) {
                Some(id) => match self.handle.delete_saved(id).await {
                    Ok(_) => self.handle.snapshot().await,
                    Err(e) => Err(e),
                },
                None => Err(ControllerError::UnknownTrip(format!("#{}", n))),
            },
            ReplCommand::Back => self.handle.back_home().await,
            ReplCommand::Show => self.handle.snapshot().await,
            ReplCommand::Help => {
                print_help();
                return Ok(());
            }
            ReplCommand::Quit => return Ok(()),
        };

        match outcome {
            Ok(snapshot) => {
                self.drain_alerts();
                self.show(snapshot);
            }
            Err(ControllerError::ChannelError) => return Err(eyre::eyre!("Controller stopped unexpectedly")),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
        Ok(())
    }

    /// Wait for a started generation to settle, then return the final state
    async fn generating(&mut self, started: Result<Snapshot, ControllerError>) -> Result<Snapshot, ControllerError> {
        let started = started?;
        self.show(started);
        self.await_view(|v| !v.is_generating()).await;
        let snapshot = self.handle.snapshot().await?;
        if snapshot.cycle.save_status != SaveStatus::Saving {
            return Ok(snapshot);
        }
        self.await_save().await;
        self.handle.snapshot().await
    }

    /// Print alerts until the running save settles
    async fn await_save(&mut self) {
        loop {
            match self.events.recv().await {
                Ok(ControllerEvent::SaveStatusChanged(status)) if status != SaveStatus::Saving => break,
                Ok(ControllerEvent::Alert { message }) => print_alert(&message),
                // Navigated away; the save no longer shows
                Ok(ControllerEvent::ViewChanged(_)) => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "await_save: events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Print alerts until a view matching `done` arrives
    ///
    /// Session changes and finished generations are not replied to, so callers
    /// read a fresh snapshot afterwards.
    async fn await_view(&mut self, done: impl Fn(&View) -> bool) {
        loop {
            match self.events.recv().await {
                Ok(ControllerEvent::ViewChanged(view)) if done(&view) => break,
                Ok(ControllerEvent::Alert { message }) => print_alert(&message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "await_view: events lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    fn drain_alerts(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let ControllerEvent::Alert { message } = event {
                print_alert(&message);
            }
        }
    }

    fn listed_id(&self, n: usize) -> Option<TripId> {
        match self.last.as_ref().map(|s| &s.view) {
            Some(View::SavedList {
                listing: SavedListing::Loaded(records),
            }) => records.get(n.checked_sub(1)?).map(|r| r.id.clone()),
            _ => None,
        }
    }

    fn show(&mut self, snapshot: Snapshot) {
        println!();
        print!("{}", render::render(&snapshot));
        self.last = Some(snapshot);
    }
}

fn print_alert(message: &str) {
    println!("{} {}", "!".bright_red().bold(), message);
}

fn print_help() {
    println!();
    println!("{}", "Commands:".bright_cyan());
    let rows = [
        ("login <user>", "Sign in"),
        ("logout", "Sign out and clear the current trip"),
        ("grant", "Allow pins to be shared with the model"),
        ("link <url>", "Use a link as the pin"),
        ("image <path>", "Use an image file as the pin"),
        ("itinerary", "Plan a day-by-day trip from the pin"),
        ("board", "Break the pin down into an aesthetic board"),
        ("edit", "Change the preferences of the current trip"),
        ("set k=v ...", "Set days, budget, travelers or vibe"),
        ("submit", "Regenerate with the edited preferences"),
        ("cancel", "Stop editing"),
        ("reset", "Start over with a new pin"),
        ("saved", "List saved trips"),
        ("open <n>", "Open a saved trip"),
        ("delete <n>", "Delete a saved trip"),
        ("back", "Leave the saved list"),
        ("show", "Show the current screen again"),
        ("quit", "Exit"),
    ];
    for (cmd, text) in rows {
        println!("  {:16} {}", cmd.yellow(), text);
    }
    println!();
}
