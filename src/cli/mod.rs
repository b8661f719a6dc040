//! Command-line interface for inspecting and maintaining a shelter cache.

pub mod ingest;
pub mod inspect;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sheltercache::{CacheConfig, FileBlobStore, ShelterCacheService};

#[derive(Parser)]
#[command(name = "sheltercache")]
#[command(version)]
#[command(about = "Inspect and maintain the shelter-data cache")]
pub struct Cli {
    /// Config file (default: ~/.sheltercache/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory holding the persisted blobs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest a chat response JSON file
    Ingest {
        /// File holding `{"cards": [...]}` or a bare card array
        file: PathBuf,
        /// Bind the ingested shelters to this chat id
        #[arg(long)]
        chat: Option<String>,
    },
    /// Show the shelters bound to a chat id
    Lookup {
        chat: String,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the binding for a chat id
    Unbind { chat: String },
    /// Print aggregate counts
    Stats,
    /// Print cache keys, chat ids and result sets as JSON
    Snapshot,
    /// Remove every cached shelter and every binding
    Clear,
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let service = open_service(cli.config.as_deref(), cli.data_dir).await?;

    match cli.command {
        Command::Ingest { file, chat } => {
            ingest::cmd_ingest(&service, &file, chat.as_deref()).await?
        }
        Command::Lookup { chat, json } => inspect::cmd_lookup(&service, &chat, json).await?,
        Command::Unbind { chat } => {
            if service.unbind(&chat).await {
                println!("Unbound chat '{}'.", chat);
            } else {
                println!("Chat '{}' had no shelters bound.", chat);
            }
        }
        Command::Stats => inspect::cmd_stats(&service).await,
        Command::Snapshot => inspect::cmd_snapshot(&service).await?,
        Command::Clear => {
            service.clear_all().await;
            println!("Shelter cache cleared.");
        }
    }

    // Queued writes must land before the runtime shuts down.
    service.flush().await;
    Ok(())
}

async fn open_service(
    config_path: Option<&std::path::Path>,
    data_dir: Option<PathBuf>,
) -> Result<ShelterCacheService> {
    let mut config = match config_path {
        Some(path) => CacheConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CacheConfig::load().with_context(|| "Failed to load configuration")?,
    };
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }

    let store = FileBlobStore::new(config.resolved_data_dir());
    Ok(ShelterCacheService::open(config, Arc::new(store)).await)
}
