//! Text rendering of controller views

use std::fmt::Write as _;

use colored::Colorize;

use crate::controller::{SaveStatus, SavedListing, SignOutReason, Snapshot, View};
use crate::domain::{BoardResult, GeneratedResult, ItineraryResult, Preferences};

/// Longest preview shown before truncating
const PREVIEW_WIDTH: usize = 60;

/// Render the current screen
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    match &snapshot.view {
        View::Unauthenticated { reason } => {
            let _ = writeln!(out, "{}", "PinTrip".bright_red().bold());
            match reason {
                SignOutReason::NoSession => {}
                SignOutReason::SignedOut => {
                    let _ = writeln!(out, "{}", "You have been signed out.".dimmed());
                }
                SignOutReason::Expired => {
                    let _ = writeln!(out, "{}", "Your session expired. Please sign in again.".yellow());
                }
            }
            let _ = writeln!(out, "Sign in with {}", "login <user>".yellow());
        }
        View::AwaitingPermission => {
            let _ = writeln!(out, "{}", "Share pins with PinTrip".bright_cyan().bold());
            let _ = writeln!(
                out,
                "PinTrip sends the images and links you share to a generative model to plan trips."
            );
            let _ = writeln!(out, "Type {} to allow this.", "grant".yellow());
        }
        View::Home => {
            let _ = writeln!(out, "{}", "Home".bright_cyan().bold());
            let _ = writeln!(
                out,
                "Drop a pin: {} or {}. See your trips with {}.",
                "link <url>".yellow(),
                "image <path>".yellow(),
                "saved".yellow()
            );
        }
        View::ModeSelection { preview } => {
            let _ = writeln!(out, "{}", "Transform Pin".bright_cyan().bold());
            let _ = writeln!(out, "Pin: {}", truncate(preview, PREVIEW_WIDTH).dimmed());
            let _ = writeln!(
                out,
                "Choose {} or {}, or {} to start over.",
                "itinerary".yellow(),
                "board".yellow(),
                "reset".yellow()
            );
        }
        View::Preferences { draft, preview, .. } => {
            let _ = writeln!(out, "{}", "Customize Trip".bright_cyan().bold());
            if let Some(preview) = preview {
                let _ = writeln!(out, "Pin: {}", truncate(preview, PREVIEW_WIDTH).dimmed());
            }
            out.push_str(&render_preferences(draft));
            let _ = writeln!(
                out,
                "Change with {}, then {} or {}.",
                "set key=value".yellow(),
                "submit".yellow(),
                "cancel".yellow()
            );
        }
        View::Generating { mode } => {
            let _ = writeln!(out, "{} {}...", "Generating".bright_magenta(), mode.as_str().to_lowercase());
        }
        View::Result { result } => {
            out.push_str(&render_result(result));
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", render_save_status(snapshot.cycle.save_status));
            let _ = writeln!(out, "{} to change preferences, {} for a new pin.", "edit".yellow(), "reset".yellow());
        }
        View::SavedList { listing } => {
            let _ = writeln!(out, "{}", "My Trips".bright_cyan().bold());
            match listing {
                SavedListing::Failed(message) => {
                    let _ = writeln!(out, "{} {}", "Could not load trips:".red(), message);
                }
                SavedListing::Loaded(records) if records.is_empty() => {
                    let _ = writeln!(out, "{}", "No saved trips yet.".dimmed());
                }
                SavedListing::Loaded(records) => {
                    for (i, record) in records.iter().enumerate() {
                        let _ = writeln!(
                            out,
                            "  {:>2}. {} {:<9} {}",
                            i + 1,
                            record.created_at.format("%b %d").to_string().dimmed(),
                            record.mode().as_str(),
                            record.result.title()
                        );
                    }
                    let _ = writeln!(out, "{} or {} a trip.", "open <n>".yellow(), "delete <n>".yellow());
                }
            }
            let _ = writeln!(out, "{} to go home.", "back".yellow());
        }
    }
    out
}

pub fn render_preferences(prefs: &Preferences) -> String {
    format!(
        "  days:      {}\n  budget:    {}\n  travelers: {}\n  vibe:      {}\n",
        prefs.days, prefs.budget, prefs.travelers, prefs.vibe
    )
}

pub fn render_save_status(status: SaveStatus) -> String {
    match status {
        SaveStatus::Idle => String::new(),
        SaveStatus::Saving => "Saving...".dimmed().to_string(),
        SaveStatus::Saved => "Saved".green().to_string(),
        SaveStatus::Error => "Save failed".red().to_string(),
    }
}

pub fn render_result(result: &GeneratedResult) -> String {
    match result {
        GeneratedResult::Itinerary(itinerary) => render_itinerary(itinerary),
        GeneratedResult::Board(board) => render_board(board),
    }
}

fn render_itinerary(itinerary: &ItineraryResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", itinerary.title.bright_white().bold());
    let _ = writeln!(
        out,
        "{}  {}",
        itinerary.destination.cyan(),
        itinerary.total_estimated_cost.green()
    );
    for day in &itinerary.days {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", format!("Day {}", day.day).bright_red().bold(), day.theme);
        for activity in &day.activities {
            let _ = writeln!(
                out,
                "  {:<10} {} {}",
                activity.time.dimmed(),
                activity.activity,
                format!("({})", activity.estimated_cost).green()
            );
            if !activity.location.is_empty() {
                let _ = writeln!(out, "             @ {}", activity.location.cyan());
            }
            if !activity.description.is_empty() {
                let _ = writeln!(out, "             {}", activity.description.dimmed());
            }
        }
    }
    out
}

fn render_board(board: &BoardResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", board.title.bright_white().bold());
    let _ = writeln!(out, "{}", board.concept.italic());
    for scene in &board.scenes {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", format!("#{}", scene.id).bright_red(), scene.title.bold());
        let _ = writeln!(out, "  {}", scene.visual_description);
        if !scene.aesthetic_note.is_empty() {
            let _ = writeln!(out, "  {}", scene.aesthetic_note.dimmed());
        }
        if !scene.mood.is_empty() {
            let _ = writeln!(out, "  mood: {}", scene.mood.magenta());
        }
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width).collect();
    format!("{}...", cut)
}
