//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::domain::{Budget, Mode};

/// PinTrip - turn a pin into a trip
#[derive(Parser)]
#[command(
    name = "pt",
    about = "Turn a pinned image or link into a travel itinerary or aesthetic board",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute; none starts the interactive client
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate once and print the result as JSON
    Generate {
        /// Link to a pin
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        link: Option<String>,

        /// Path to an image file
        #[arg(long)]
        image: Option<PathBuf>,

        /// itinerary or board
        #[arg(short, long, value_parser = parse_mode)]
        mode: Mode,

        /// Number of days (1-7)
        #[arg(long)]
        days: Option<u32>,

        /// Budget, Moderate or Luxury
        #[arg(long, value_parser = parse_budget)]
        budget: Option<Budget>,

        /// Who is travelling, e.g. Couple
        #[arg(long)]
        travelers: Option<String>,

        /// The feel of the trip, e.g. Authentic
        #[arg(long)]
        vibe: Option<String>,

        /// Store the result for the signed-in user
        #[arg(long)]
        save: bool,
    },

    /// Record a session for a user
    Login {
        #[arg(short, long)]
        user: String,

        /// Access token for the hosted store
        #[arg(short, long)]
        token: Option<String>,

        /// Session lifetime in seconds
        #[arg(long)]
        expires_in_secs: Option<i64>,
    },

    /// Sign out
    Logout,

    /// Allow pins to be shared with the model
    Grant,

    /// Show the signed-in user
    Whoami,

    /// Manage saved trips of the signed-in user
    Trips {
        #[command(subcommand)]
        command: TripsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TripsCommand {
    /// List trips, newest first
    List,

    /// Print one trip as JSON
    Show { id: String },

    /// Delete a trip
    Delete { id: String },
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse()
}

fn parse_budget(s: &str) -> Result<Budget, String> {
    s.parse::<Budget>().map_err(|e| e.to_string())
}

/// Default log file location
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pintrip")
        .join("logs")
        .join("pintrip.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Help footer showing where logs go
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "pt",
            "generate",
            "--link",
            "https://pin.it/abc123",
            "--mode",
            "board",
            "--budget",
            "luxury",
            "--days",
            "4",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Generate {
                link, mode, budget, days, save, ..
            }) => {
                assert_eq!(link.as_deref(), Some("https://pin.it/abc123"));
                assert_eq!(mode, Mode::Board);
                assert_eq!(budget, Some(Budget::Luxury));
                assert_eq!(days, Some(4));
                assert!(!save);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_needs_exactly_one_input() {
        assert!(Cli::try_parse_from(["pt", "generate", "--mode", "board"]).is_err());
        assert!(
            Cli::try_parse_from([
                "pt",
                "generate",
                "--mode",
                "board",
                "--link",
                "x",
                "--image",
                "pin.png"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["pt"]).unwrap();
        assert!(cli.command.is_none());
    }
}
