pub mod cli;
pub mod commands;
pub mod logging;

use std::io;

use anyhow::Result;

use webrag_core::config::{Config, RagSettings};

use crate::cli::{fill_api_keys, fill_user_agent, Cli, Command};

/// Resolve settings from config files, environment and flags.
pub fn settings(cli: &Cli) -> Result<RagSettings> {
    let config = Config::load_with(cli.config.as_deref())?;
    let mut settings = config.settings()?;
    fill_api_keys(&mut settings, std::env::var("OPENAI_API_KEY").ok());
    fill_user_agent(&mut settings, std::env::var("USER_AGENT").ok());
    cli.apply(&mut settings)?;
    Ok(settings)
}

pub fn run(cli: &Cli, settings: &RagSettings) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::Ask { questions } => commands::ask(settings, questions, &mut out),
        Command::Search { query } => commands::search(settings, query, &mut out),
        Command::Chunks => commands::chunks(settings, &mut out),
    }
}

/// `<kind>: <message>` for pipeline errors, the full chain otherwise.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<webrag_core::Error>() {
        Some(e) => format!("{}: {e}", e.kind()),
        None => format!("Error: {err:#}"),
    }
}
