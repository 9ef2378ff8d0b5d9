//! Handlers for shortlists, as JSON and as a CSV report.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/predictions/shortlist` | `?field=&horizon=one_year\|three_year[&limit=]` |
//! | `GET`  | `/reports/shortlist.csv` | Same parameters; `text/csv` body |

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::IntoResponse,
};
use laurel_core::{
  prediction::{Horizon, ShortlistEntry},
  store::PredictionStore,
};
use laurel_pipeline::report::shortlist_csv;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ShortlistParams {
  pub field:   String,
  pub horizon: Horizon,
  pub limit:   Option<usize>,
}

async fn fetch<S>(state: &AppState<S>, params: ShortlistParams) -> Result<Vec<ShortlistEntry>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
  if limit == 0 {
    return Err(ApiError::BadRequest("limit must be positive".into()));
  }
  state
    .store
    .shortlist(params.field, params.horizon, limit)
    .await
    .map_err(ApiError::store)
}

/// `GET /predictions/shortlist?field=<field>&horizon=<horizon>[&limit=<n>]`
pub async fn shortlist<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ShortlistParams>,
) -> Result<Json<Vec<ShortlistEntry>>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Ok(Json(fetch(&state, params).await?))
}

/// `GET /reports/shortlist.csv?field=<field>&horizon=<horizon>[&limit=<n>]`
pub async fn shortlist_report<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ShortlistParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entries = fetch(&state, params).await?;
  let body = shortlist_csv(&entries)?;
  Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}
