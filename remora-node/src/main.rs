//! # Remora Node CLI
//!
//! Command-line client for a remote JSON key/value store behind the
//! remora write-back cache.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

mod commands;

use commands::Target;

/// CLI structure
#[derive(Parser, Debug)]
#[command(name = "remora")]
#[command(about = "Remora - cached access to remote JSON key/value stores")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $REMORA_CONFIG, ./remora.toml, then the user config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Backend type tag (memory, testStub, couch, webdav, simple)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Base address of the remote store
    #[arg(long, global = true)]
    storage_address: Option<String>,

    /// Bearer token for the remote store
    #[arg(long, global = true)]
    bearer_token: Option<String>,

    /// Print values as compact JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a document
    Get { key: String },

    /// Write a document (JSON)
    Set { key: String, value: String },

    /// Remove a document
    Remove { key: String },

    /// Read a value inside a document, path like `a.b.0`
    GetSub { key: String, path: String },

    /// Write a value inside a document, path like `a.b.0`
    SetSub {
        key: String,
        path: String,
        value: String,
    },

    /// Smoke test: init, write a test document, read it back, close
    Check {
        /// Storage record as JSON: {"bearerToken", "storageInfo": {"api", "template", "auth"}}
        #[arg(long)]
        storage_info: Option<String>,
    },

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    info!("Running command: {:?}", cli.command);

    match run_command(cli).await {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }
    if let Some(address) = cli.storage_address {
        config.backend.settings.storage_address = Some(address);
    }
    if let Some(token) = cli.bearer_token {
        config.backend.settings.bearer_token = Some(token);
    }

    let output = commands::Output { compact: cli.compact };

    match cli.command {
        Commands::Get { key } => commands::ops::get(&config, &output, &key).await,
        Commands::Set { key, value } => commands::ops::set(&config, &key, &value).await,
        Commands::Remove { key } => commands::ops::remove(&config, &key).await,
        Commands::GetSub { key, path } => commands::ops::get_sub(&config, &output, &key, &path).await,
        Commands::SetSub { key, path, value } => {
            commands::ops::set_sub(&config, &key, &path, &value).await
        }
        Commands::Check { storage_info } => {
            let target = match storage_info {
                Some(record) => commands::storage_info::parse(&record)?,
                None => Target::from_config(&config),
            };
            commands::check::run(target, &output).await
        }
        Commands::Config => commands::show_config(&config),
    }
}
