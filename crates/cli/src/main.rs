//! Goblin CLI
//!
//! Upload, fetch and manage gobs against a memory or Redis backend.

mod commands;
mod config;
mod store_factory;
mod telemetry;
mod watcher;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use goblin_facade::GobStore;

use crate::commands::Context;
use crate::commands::gob::GobCommand;
use crate::config::GoblinConfig;
use crate::watcher::ConfigWatcher;

/// Goblin CLI: a small store for pastebin gobs.
#[derive(Parser, Debug)]
#[command(name = "goblin", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "GOBLIN_CONFIG", default_value = "goblin.toml", global = true)]
    config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Source address recorded on uploaded gobs.
    #[arg(long, env = "GOBLIN_SOURCE_IP", default_value = "127.0.0.1", global = true)]
    ip: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Gob(GobCommand),
    /// Interactive session; the config file is reloaded on change.
    Shell,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = GoblinConfig::load(&cli.config)?;
    telemetry::init(&config.logging.level);
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let store = store_factory::create_store(&config)?;
    let gobs = Arc::new(GobStore::new(store, config.settings()));
    let ctx = Context {
        format: cli.format,
        ip: cli.ip,
        read_stdin: true,
    };

    match cli.command {
        Command::Gob(command) => {
            let mut out = Vec::new();
            let result = commands::gob::run(&gobs, command, &ctx, &mut out).await;
            std::io::stdout().write_all(&out)?;
            result
        }
        Command::Shell => {
            let watcher = ConfigWatcher::new(Arc::clone(&gobs), &cli.config).spawn();
            let result = commands::shell::run(&gobs, &ctx).await;
            watcher.abort();
            result
        }
    }
}
