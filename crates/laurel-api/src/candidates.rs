//! Handlers for `/candidates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/candidates/{id}` | Candidate plus latest snapshot; 404 if either is missing |
//! | `GET`  | `/candidates/{id}/provenance` | 503 if the provenance document is absent |

use axum::{
  Json,
  extract::{Path, State},
};
use laurel_core::{
  candidate::CandidateDetail,
  prediction::ProvenanceRecord,
  store::PredictionStore,
};
use laurel_pipeline::provenance::provenance_for;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /candidates/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CandidateDetail>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let detail = state
    .store
    .candidate_detail(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("candidate {id} not found")))?;
  Ok(Json(detail))
}

/// `GET /candidates/{id}/provenance`
pub async fn provenance<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProvenanceRecord>>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let candidate = state
    .store
    .get_candidate(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("candidate {id} not found")))?;

  let path = state.pipeline.config().provenance_path();
  let records = provenance_for(&path, &candidate.external_id).await?;
  Ok(Json(records))
}
