//! PinTrip - turn a pin into a trip
//!
//! CLI entry point for the interactive client and one-shot commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use pintrip::cli::{Cli, Command, TripsCommand, generate_after_help, get_log_path};
use pintrip::config::Config;
use pintrip::domain::{Budget, ImagePayload, InputReference, Mode, NewTrip, Preferences, TripId, TripRecordWire};
use pintrip::flags::{FileFlagStore, FlagStore};
use pintrip::gateway::{TripGateway, create_gateway};
use pintrip::generation::{GenerationService, PromptLoader};
use pintrip::llm::create_client;
use pintrip::repl;
use pintrip::session::{FileSessionProvider, Session, SessionProvider};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // CLI --log-level > config file > INFO
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, backend = ?config.store.backend, "PinTrip loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Generate {
            link,
            image,
            mode,
            days,
            budget,
            travelers,
            vibe,
            save,
        }) => {
            debug!(?mode, save, "main: matched Generate command");
            let prefs = build_preferences(days, budget, travelers, vibe)?;
            cmd_generate(&config, link, image, mode, prefs, save).await
        }
        Some(Command::Login {
            user,
            token,
            expires_in_secs,
        }) => {
            debug!(%user, "main: matched Login command");
            cmd_login(&config, user, token, expires_in_secs)
        }
        Some(Command::Logout) => {
            debug!("main: matched Logout command");
            cmd_logout(&config)
        }
        Some(Command::Grant) => {
            debug!("main: matched Grant command");
            cmd_grant(&config)
        }
        Some(Command::Whoami) => {
            debug!("main: matched Whoami command");
            cmd_whoami(&config)
        }
        Some(Command::Trips { command }) => {
            debug!(?command, "main: matched Trips command");
            cmd_trips(&config, command).await
        }
        None => {
            debug!("main: no command specified, starting interactive client");
            repl::run_interactive(&config).await
        }
    }
}

fn build_preferences(
    days: Option<u32>,
    budget: Option<Budget>,
    travelers: Option<String>,
    vibe: Option<String>,
) -> Result<Preferences> {
    let defaults = Preferences::default();
    let prefs = Preferences {
        days: days.unwrap_or(defaults.days),
        budget: budget.unwrap_or(defaults.budget),
        travelers: travelers.unwrap_or(defaults.travelers),
        vibe: vibe.unwrap_or(defaults.vibe),
    };
    prefs.validate()?;
    Ok(prefs)
}

fn open_sessions(config: &Config) -> Result<FileSessionProvider> {
    FileSessionProvider::open(config.paths.session_file()).context("Failed to read session")
}

/// Session for commands that act on the user's trips
fn require_session(config: &Config) -> Result<Session> {
    let sessions = open_sessions(config)?;
    if sessions.check_expiry()? {
        return Err(eyre::eyre!("Session expired. Run `pt login` again."));
    }
    sessions
        .current()
        .ok_or_else(|| eyre::eyre!("Not signed in. Run `pt login --user <id>` first."))
}

/// Generate once and print the result
async fn cmd_generate(
    config: &Config,
    link: Option<String>,
    image: Option<PathBuf>,
    mode: Mode,
    prefs: Preferences,
    save: bool,
) -> Result<()> {
    debug!(?mode, save, "cmd_generate: called");
    config.validate()?;

    let flags = FileFlagStore::new(config.paths.flags_file());
    if !flags.permission_granted() {
        return Err(eyre::eyre!(
            "Sharing permission has not been granted. Run `pt grant` to allow pins to be sent to the model."
        ));
    }

    // Resolve the session before spending a model call on a result that cannot be saved
    let session = if save { Some(require_session(config)?) } else { None };

    let image = image.map(ImagePayload::from_path).transpose()?;
    let input = InputReference::from_parts(image, link)?;

    let llm = create_client(&config.llm).context("Failed to create model client")?;
    let service = GenerationService::new(llm, PromptLoader::new(config.paths.prompts_dir.clone()));

    eprintln!("{} {}...", "Generating".bright_magenta(), mode.as_str().to_lowercase());
    let result = service.generate(&input, &prefs, mode).await?;
    println!("{}", serde_json::to_string_pretty(&result.to_value())?);

    if let Some(session) = session {
        let gateway = create_gateway(&config.store).context("Failed to open trip store")?;
        let id = gateway
            .insert(
                &session,
                NewTrip {
                    source_url: Some(input.source_label()),
                    preferences: prefs,
                    result,
                },
            )
            .await
            .context("Failed to save trip")?;
        eprintln!("{} {}", "Saved".green(), id);
    }
    Ok(())
}

fn cmd_login(config: &Config, user: String, token: Option<String>, expires_in_secs: Option<i64>) -> Result<()> {
    debug!(%user, has_token = token.is_some(), ?expires_in_secs, "cmd_login: called");
    let mut session = Session::new(user);
    if let Some(token) = token {
        session = session.with_token(token, expires_in_secs.map(chrono::Duration::seconds));
    } else if let Some(secs) = expires_in_secs {
        session.expires_at = Some(chrono::Utc::now() + chrono::Duration::seconds(secs));
    }

    let owner = session.owner_id.clone();
    open_sessions(config)?.sign_in(session)?;
    println!("Signed in as {}", owner.bold());
    Ok(())
}

fn cmd_logout(config: &Config) -> Result<()> {
    debug!("cmd_logout: called");
    open_sessions(config)?.sign_out()?;
    println!("Signed out");
    Ok(())
}

fn cmd_grant(config: &Config) -> Result<()> {
    debug!("cmd_grant: called");
    FileFlagStore::new(config.paths.flags_file()).grant_permission()?;
    println!("Sharing permission granted");
    Ok(())
}

fn cmd_whoami(config: &Config) -> Result<()> {
    debug!("cmd_whoami: called");
    let sessions = open_sessions(config)?;
    sessions.check_expiry()?;
    match sessions.current() {
        Some(session) => {
            println!("{}", session.owner_id.bold());
            if let Some(expires_at) = session.expires_at {
                println!("Session expires {}", expires_at.to_rfc3339());
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn cmd_trips(config: &Config, command: TripsCommand) -> Result<()> {
    debug!(?command, "cmd_trips: called");
    let session = require_session(config)?;
    let gateway: Arc<dyn TripGateway> = create_gateway(&config.store).context("Failed to open trip store")?;

    match command {
        TripsCommand::List => {
            let records = gateway.list_by_owner(&session).await?;
            if records.is_empty() {
                println!("No saved trips yet.");
            }
            for record in records {
                println!(
                    "{}  {}  {:<9}  {}",
                    record.id.to_string().dimmed(),
                    record.created_at.format("%Y-%m-%d"),
                    record.mode().as_str(),
                    record.result.title()
                );
            }
        }
        TripsCommand::Show { id } => {
            let records = gateway.list_by_owner(&session).await?;
            let record = records
                .iter()
                .find(|r| r.id.as_str() == id)
                .ok_or_else(|| eyre::eyre!("Trip not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&TripRecordWire::from(record))?);
        }
        TripsCommand::Delete { id } => {
            gateway.delete(&session, &TripId::new(id.clone())).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}
