//! MedVault CLI - a command-line client for the MedVault hospital backend.
//!
//! Logs in, keeps the session token between runs, and reads or updates the
//! patient and doctor resources exposed under `/api`.

mod cli;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use medvault_core::auth::open_token_store;
use medvault_core::navigation::Redirector;
use medvault_core::{ApiClient, Config, Session, SessionEvents};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use commands::TerminalNavigator;

/// Log file prefix inside `<data_dir>/logs`
const LOG_FILE_PREFIX: &str = "medvault.log";

/// Initialize the tracing subscriber for logging.
/// Returns the guard keeping the file writer alive, if file logging is set up.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };
    config.apply_env();
    if cli.api_url.is_some() {
        config.api_url = cli.api_url.clone();
    }
    if cli.origin.is_some() {
        config.origin = cli.origin.clone();
    }

    let _guard = init_tracing(&config);
    info!(base_url = %config.base_url(), "MedVault CLI starting");

    let tokens = open_token_store(&config)?;
    let events = SessionEvents::new();
    let mut event_rx = events.subscribe();
    let api = ApiClient::from_config(&config, tokens, events)?;
    let session = Session::new(api);

    let mut redirector = Redirector::new(TerminalNavigator::at(cli.command.view()));
    let result = commands::run(cli.command, &session, &mut config).await;

    let navigations = redirector.drain(&mut event_rx);
    debug!(navigations, "Session events handled");
    if let Err(ref e) = result {
        warn!(error = %e, "Command failed");
    }

    result
}
