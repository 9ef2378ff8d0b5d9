//! Handlers that trigger pipeline runs.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/etl` | Ingest every seed file; 422 if a table fails the quality gate |
//! | `POST` | `/train` | Train, score and persist every staged field; 503 before ETL |

use std::{collections::BTreeMap, path::PathBuf};

use axum::{Json, extract::State};
use laurel_core::store::{IngestSummary, PredictionStore};
use serde::Serialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct IngestedField {
  pub field:   String,
  pub summary: IngestSummary,
}

#[derive(Debug, Serialize)]
pub struct EtlResponse {
  pub run_id: String,
  pub fields: Vec<IngestedField>,
}

/// `POST /etl`
pub async fn etl<S>(State(state): State<AppState<S>>) -> Result<Json<EtlResponse>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let outcome = state.pipeline.run_etl().await?;
  Ok(Json(EtlResponse {
    run_id: outcome.run_id,
    fields: outcome
      .fields
      .into_iter()
      .map(|f| IngestedField { field: f.field, summary: f.summary })
      .collect(),
  }))
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
  pub model_paths:      BTreeMap<String, BTreeMap<String, PathBuf>>,
  pub prediction_count: usize,
  pub run_id:           String,
}

/// `POST /train`
pub async fn train<S>(State(state): State<AppState<S>>) -> Result<Json<TrainResponse>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let outcome = state.pipeline.run_training().await?;
  Ok(Json(TrainResponse {
    model_paths:      outcome.model_paths,
    prediction_count: outcome.prediction_count,
    run_id:           outcome.run_id,
  }))
}
