//! tally server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the evaluation API over HTTP. Learner
//! events are fanned out in-process and logged at `debug`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tally_engine::{BroadcastPublisher, Engine};
use tally_server::{AppState, ServerConfig};
use tally_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally learner-state server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TALLY").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let publisher = BroadcastPublisher::new(server_cfg.engine.publish_capacity);
  spawn_event_log(&publisher);

  // Build application state.
  let engine = Engine::new(
    Arc::new(store),
    Arc::new(publisher),
    server_cfg.engine.clone(),
  );
  let state = AppState {
    engine,
    config: Arc::new(server_cfg.clone()),
  };

  let app = tally_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Drain the event channel so published learner events show up in the log.
fn spawn_event_log(publisher: &BroadcastPublisher) {
  let mut rx = publisher.subscribe();
  tokio::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(event) => tracing::debug!(?event, "learner event"),
        Err(RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "event log fell behind");
        }
        Err(RecvError::Closed) => break,
      }
    }
  });
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
