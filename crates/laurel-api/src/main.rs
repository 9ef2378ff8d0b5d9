//! `laurel` binary.
//!
//! Reads `laurel.toml` (or the path given with `--config`) layered under
//! `LAUREL_*` environment variables, opens the SQLite store, and either
//! serves the HTTP API or runs one pipeline pass and prints its outcome as
//! JSON.
//!
//! ```text
//! laurel serve            # default
//! laurel etl              # ingest every seed file
//! laurel train            # train, score and persist every staged field
//! laurel run              # etl, then train
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use laurel_api::{AppState, ServerConfig};
use laurel_pipeline::Pipeline;
use laurel_store_sqlite::SqliteStore;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Laurel award-candidate forecasting pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "laurel.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Serve the HTTP API.
  Serve,
  /// Stage, gate and ingest every seed file.
  Etl,
  /// Train, score and persist every staged field.
  Train,
  /// ETL followed by training.
  Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LAUREL").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  let pipeline_cfg = &mut server_cfg.pipeline;
  pipeline_cfg.data_dir = expand_tilde(&pipeline_cfg.data_dir);
  pipeline_cfg.model_dir = expand_tilde(&pipeline_cfg.model_dir);
  pipeline_cfg.seed_dir = pipeline_cfg.seed_dir.as_deref().map(expand_tilde);

  if let Some(parent) = server_cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;
  let store = Arc::new(store);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, server_cfg).await,
    command => {
      let pipeline = Pipeline::new(store, server_cfg.pipeline);
      if matches!(command, Command::Etl | Command::Run) {
        print_json(&pipeline.run_etl().await.context("ETL run failed")?)?;
      }
      if matches!(command, Command::Train | Command::Run) {
        print_json(&pipeline.run_training().await.context("training run failed")?)?;
      }
      Ok(())
    }
  }
}

async fn serve(store: Arc<SqliteStore>, server_cfg: ServerConfig) -> anyhow::Result<()> {
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let app = laurel_api::router(AppState::new(store, server_cfg.pipeline));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
