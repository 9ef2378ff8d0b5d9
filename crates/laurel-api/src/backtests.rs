//! Handler for `GET /backtests`.

use axum::{
  Json,
  extract::{Query, State},
};
use laurel_core::{prediction::BacktestMetric, store::PredictionStore};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub field: Option<String>,
}

/// `GET /backtests[?field=<field>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<BacktestMetric>>, ApiError>
where
  S: PredictionStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let metrics = state
    .store
    .list_backtest_metrics(params.field)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(metrics))
}
