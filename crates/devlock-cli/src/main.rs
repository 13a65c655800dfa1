//! # devlock CLI Entry Point
//!
//! Loads configuration, opens the state store, bootstraps the engine, and
//! dispatches one subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use devlock_cli::commands::{self, Command};
use devlock_cli::standins::{
    default_capabilities, CliPlatform, LoggingActivator, LoggingRecovery, LoggingReporter,
};
use devlock_core::EngineConfig;
use devlock_engine::{bootstrap, Collaborators, JsonFileStore};

const DEFAULT_STORE_PATH: &str = "devlock-state.json";

/// Device lock engine driver.
///
/// Every invocation reloads state from the JSON store, applies one command,
/// and prints the resulting status.
#[derive(Parser, Debug)]
#[command(name = "devlock", version, about)]
struct Cli {
    /// Engine configuration (YAML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON state document. Overrides `store.path` from the config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Report out-of-box setup as incomplete.
    #[arg(long, global = true)]
    setup_incomplete: bool,

    /// Report the active user as locked, deferring lock task activation.
    #[arg(long, global = true)]
    user_locked: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let store_path = cli
        .store
        .clone()
        .or_else(|| config.store.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
    tracing::debug!(store = %store_path.display(), "opening state store");

    let engine = bootstrap(
        config,
        Collaborators {
            store: Arc::new(JsonFileStore::new(store_path)),
            capabilities: default_capabilities(),
            activator: Arc::new(LoggingActivator::default()),
            platform: Arc::new(CliPlatform {
                setup_complete: !cli.setup_incomplete,
                user_unlocked: !cli.user_locked,
            }),
            recovery: Arc::new(LoggingRecovery),
            reporter: Arc::new(LoggingReporter),
        },
    )?;

    let status = commands::run(&engine, cli.command).await.map_err(|e| {
        tracing::error!("command failed: {e:#}");
        e
    })?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
