use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;

use tripstore::TripStore;

/// Operator tool for inspecting a local trip store
#[derive(Parser, Debug)]
#[command(name = "tripstore")]
#[command(author, version, about = "Inspect and prune locally stored trips", long_about = None)]
struct Cli {
    /// Store directory (default: <data dir>/pintrip/store)
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List trips owned by a user, newest first
    List {
        /// Owner user id
        #[arg(short, long, required = true)]
        user: String,
    },

    /// Print one trip as JSON
    Show {
        /// Owner user id
        #[arg(short, long, required = true)]
        user: String,

        /// Trip id
        #[arg(required = true)]
        id: String,
    },

    /// Delete one trip
    Delete {
        /// Owner user id
        #[arg(short, long, required = true)]
        user: String,

        /// Trip id
        #[arg(required = true)]
        id: String,
    },

    /// Print the store directory
    Path,
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pintrip")
        .join("store")
}

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let store_path = cli.store.unwrap_or_else(default_store_path);

    info!("tripstore starting");

    match cli.command {
        Command::List { user } => {
            let store = TripStore::open(&store_path)?;
            let rows = store.list_by_owner(&user)?;
            if rows.is_empty() {
                println!("No trips found");
            }
            for row in rows {
                let title = row.result_data["title"].as_str().unwrap_or("(untitled)").to_string();
                println!(
                    "{} {} {} {}",
                    row.id.yellow(),
                    row.created_at.format("%b %d").to_string().dimmed(),
                    row.kind.cyan(),
                    title
                );
            }
        }
        Command::Show { user, id } => {
            let store = TripStore::open(&store_path)?;
            let row = store
                .get(&user, &id)?
                .ok_or_else(|| eyre!("Trip not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
        Command::Delete { user, id } => {
            let mut store = TripStore::open(&store_path)?;
            if store.delete(&user, &id)? {
                println!("{} Deleted trip: {}", "✓".green(), id);
            } else {
                return Err(eyre!("Trip not found: {}", id));
            }
        }
        Command::Path => {
            println!("{}", store_path.display());
        }
    }

    Ok(())
}
