//! engramd daemon - memory engine HTTP server

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use engramd::config::Config;
use engramd::embedding::{Embedder, HashEmbedder, RemoteEmbedder};
use engramd::error::{EngineError, Result};
use engramd::extractor::{CompletionProvider, NativeCompletion, RemoteCompletion};
use engramd::server::{self, AppState};
use engramd::storage::{EmbeddedStore, MemoryStore};

/// engramd - self-hosted memory engine for AI agents
#[derive(Parser)]
#[command(name = "engramd")]
#[command(about = "Self-hosted memory engine for AI agents")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,engramd=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("loading config from: {}", path.display());
        return parse_config_file(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".engramd").join("config.toml")),
        dirs::config_dir().map(|c| c.join("engramd").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("loading config from: {}", path.display());
            return parse_config_file(path);
        }
    }

    tracing::info!("no config file found, using defaults");
    Ok(Config::default())
}

fn parse_config_file(path: &PathBuf) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    toml::from_str(&content)
        .map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.embedding.dimension))),
        "remote" => Ok(Arc::new(RemoteEmbedder::new(&config.embedding)?)),
        other => Err(EngineError::Config(format!(
            "unknown embedding provider '{other}'"
        ))),
    }
}

fn build_completion(config: &Config) -> Result<Arc<dyn CompletionProvider>> {
    match config.completion.provider.as_str() {
        "native" => Ok(Arc::new(NativeCompletion::new())),
        "remote" => Ok(Arc::new(RemoteCompletion::new(&config.completion)?)),
        other => Err(EngineError::Config(format!(
            "unknown completion provider '{other}'"
        ))),
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("starting engramd daemon");

    let config = load_config(config_path)?;
    tracing::debug!("config loaded: {:?}", config);

    let dimension = config.embedding.dimension;
    let store: Arc<dyn MemoryStore> = if config.storage.ephemeral {
        tracing::info!("storage: ephemeral (no snapshot)");
        Arc::new(EmbeddedStore::new(dimension))
    } else {
        let data_dir = &config.storage.data_dir;
        std::fs::create_dir_all(data_dir).map_err(|e| {
            EngineError::Store(format!(
                "failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;
        let snapshot_path = data_dir.join("snapshot.json");
        tracing::info!("storage: embedded snapshot at {}", snapshot_path.display());
        Arc::new(EmbeddedStore::with_snapshot(dimension, snapshot_path))
    };
    store.initialize().await?;

    let embedder = build_embedder(&config)?;
    let completion = build_completion(&config)?;
    tracing::info!(
        embedder = embedder.name(),
        completion = completion.name(),
        dimension,
        "providers initialized"
    );

    let state = Arc::new(AppState::new(
        store.clone(),
        embedder,
        completion,
        &config,
    ));

    server::serve(state, &config).await?;

    // Persist the snapshot after the listener has drained.
    store.close().await?;

    tracing::info!("engramd daemon stopped");
    Ok(())
}
