//! Interactive terminal client
//!
//! Drives a `ControllerHandle` from a line editor and renders each view as
//! colored text.

pub mod render;
mod session;

pub use session::{ReplCommand, ReplSession};

use std::sync::Arc;

use eyre::{Context, Result};

use crate::config::Config;
use crate::controller::{Controller, ControllerHandle};
use crate::flags::FileFlagStore;
use crate::gateway::create_gateway;
use crate::generation::{GenerationService, PromptLoader};
use crate::llm::create_client;
use crate::session::{FileSessionProvider, SessionProvider};

/// Run the interactive client
///
/// This is the entry point for `pt` without a subcommand.
pub async fn run_interactive(config: &Config) -> Result<()> {
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create model client")?;
    let generation = Arc::new(GenerationService::new(
        llm,
        PromptLoader::new(config.paths.prompts_dir.clone()),
    ));
    let gateway = create_gateway(&config.store).context("Failed to open trip store")?;
    let sessions: Arc<dyn SessionProvider> = Arc::new(
        FileSessionProvider::open(config.paths.session_file()).context("Failed to read session")?,
    );
    let flags = Arc::new(FileFlagStore::new(config.paths.flags_file()));

    let controller = Controller::new(generation, gateway, sessions.clone(), flags);
    let handle = ControllerHandle::spawn(controller);

    let mut session = ReplSession::new(handle, sessions);
    session.run().await
}
