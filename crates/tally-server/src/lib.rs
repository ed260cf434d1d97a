//! HTTP surface for the Tally learner-state engine.
//!
//! Exposes an axum [`Router`] that ingests scenario evaluation results and
//! serves the resulting learner state, backed by any store implementing the
//! `tally-core` traits.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tally_core::{
  event::EventPublisher,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};
use tally_engine::{Engine, EngineConfig};
use tower_http::trace::TraceLayer;

use handlers::{attempts, competency, evaluations, progress, scores};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub engine:     EngineConfig,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub engine: Engine<S, P>,
  pub config: Arc<ServerConfig>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      engine: self.engine.clone(),
      config: Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the server.
pub fn router<S, P>(state: AppState<S, P>) -> Router
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  const ELEMENT: &str =
    "/deployments/{deployment_id}/students/{student_id}/elements/{element_id}";

  Router::new()
    .route("/evaluations", post(evaluations::create::<S, P>))
    .route(&format!("{ELEMENT}/attempt"), get(attempts::latest::<S, P>))
    .route(&format!("{ELEMENT}/progress"), get(progress::latest::<S, P>))
    .route(&format!("{ELEMENT}/score"), get(scores::compute::<S, P>))
    .route(
      "/students/{student_id}/documents/{document_id}/items/{item_id}/competency",
      get(competency::latest::<S, P>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
