//! JSON HTTP surface for the Laurel pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`PredictionStore`]: two run
//! triggers and read-only queries over candidates, shortlists and backtests.
//! Auth and TLS are the caller's responsibility.
//!
//! | Method | Path | Module |
//! |--------|------|--------|
//! | `POST` | `/etl`, `/train` | [`runs`] |
//! | `GET`  | `/predictions/shortlist`, `/reports/shortlist.csv` | [`predictions`] |
//! | `GET`  | `/candidates/{id}`, `/candidates/{id}/provenance` | [`candidates`] |
//! | `GET`  | `/backtests` | [`backtests`] |
//! | `GET`  | `/health` | |

pub mod backtests;
pub mod candidates;
pub mod error;
pub mod predictions;
pub mod runs;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{get, post},
};
use laurel_core::store::PredictionStore;
use laurel_pipeline::{Pipeline, PipelineConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `laurel.toml` and `LAUREL_*`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(flatten)]
  pub pipeline:   PipelineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8000,
      store_path: PathBuf::from("storage/laurel.db"),
      pipeline:   PipelineConfig::default(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub pipeline: Arc<Pipeline<S>>,
}

impl<S: PredictionStore> AppState<S> {
  pub fn new(store: Arc<S>, config: PipelineConfig) -> Self {
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), config));
    Self { store, pipeline }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: PredictionStore + Clone + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Runs
    .route("/etl", post(runs::etl::<S>))
    .route("/train", post(runs::train::<S>))
    // Predictions
    .route("/predictions/shortlist", get(predictions::shortlist::<S>))
    .route("/reports/shortlist.csv", get(predictions::shortlist_report::<S>))
    // Candidates
    .route("/candidates/{id}", get(candidates::get_one::<S>))
    .route("/candidates/{id}/provenance", get(candidates::provenance::<S>))
    // Backtests
    .route("/backtests", get(backtests::list::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "healthy" })) }

#[cfg(test)]
mod tests;
