//! The `PredictionStore` trait and supporting summary types.
//!
//! The trait is implemented by storage backends (e.g. `laurel-store-sqlite`).
//! The pipeline and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  candidate::{Candidate, CandidateDetail, FeatureSnapshot, SeedBatch},
  prediction::{
    BacktestMetric, Horizon, NewBacktestMetric, NewPrediction, Prediction,
    ShapAttribution, ShortlistEntry,
  },
};

// ─── Summaries ───────────────────────────────────────────────────────────────

/// What a call to [`PredictionStore::ingest_batch`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
  pub candidates_created: usize,
  pub candidates_updated: usize,
  pub snapshots_created:  usize,
  pub snapshots_updated:  usize,
}

/// What a prediction write changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
  /// Prediction rows removed (prior run rows, or laureate rows on upsert).
  pub deleted:          usize,
  pub inserted:         usize,
  pub updated:          usize,
  pub attribution_rows: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable store backing the prediction pipeline.
///
/// Every multi-row write runs inside one transaction: it either commits in
/// full or leaves the store exactly as it was.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PredictionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Merge a seed batch: find-or-create each candidate by external id, then
  /// find-or-create its snapshot by (candidate, as-of-year), overwriting the
  /// numeric features of an existing snapshot.
  ///
  /// This is the only operation that creates candidates.
  fn ingest_batch(
    &self,
    batch: SeedBatch,
  ) -> impl Future<Output = Result<IngestSummary, Self::Error>> + Send + '_;

  // ── Candidates ────────────────────────────────────────────────────────

  /// Retrieve a candidate by primary key. Returns `None` if not found.
  fn get_candidate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Candidate>, Self::Error>> + Send + '_;

  /// Retrieve a candidate by external id. Returns `None` if not found.
  fn find_candidate(
    &self,
    external_id: String,
  ) -> impl Future<Output = Result<Option<Candidate>, Self::Error>> + Send + '_;

  /// List candidates, optionally restricted to one field.
  fn list_candidates(
    &self,
    field: Option<String>,
  ) -> impl Future<Output = Result<Vec<Candidate>, Self::Error>> + Send + '_;

  /// The candidate with its most recent snapshot. Returns `None` if either
  /// is missing.
  fn candidate_detail(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CandidateDetail>, Self::Error>> + Send + '_;

  /// All snapshots of a candidate, oldest year first.
  fn list_snapshots(
    &self,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FeatureSnapshot>, Self::Error>> + Send + '_;

  // ── Predictions ───────────────────────────────────────────────────────

  /// Delete every prediction (and its attribution rows) for `field`, then
  /// insert `predictions`, in one transaction.
  fn replace_predictions(
    &self,
    field: String,
    predictions: Vec<NewPrediction>,
  ) -> impl Future<Output = Result<PersistSummary, Self::Error>> + Send + '_;

  /// Find-or-create each prediction by (candidate, year, horizon) and
  /// overwrite its probability and attributions; drop rows that belong to
  /// laureates of `field`. One transaction.
  fn upsert_predictions(
    &self,
    field: String,
    predictions: Vec<NewPrediction>,
  ) -> impl Future<Output = Result<PersistSummary, Self::Error>> + Send + '_;

  /// Predictions for `field`, optionally restricted to one horizon.
  fn list_predictions(
    &self,
    field: String,
    horizon: Option<Horizon>,
  ) -> impl Future<Output = Result<Vec<Prediction>, Self::Error>> + Send + '_;

  /// The attribution child rows of one prediction, in tracked-feature order.
  fn get_attributions(
    &self,
    prediction_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ShapAttribution>, Self::Error>> + Send + '_;

  /// Highest-probability predictions of non-laureates for a field and
  /// horizon, at most `limit` entries.
  fn shortlist(
    &self,
    field: String,
    horizon: Horizon,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ShortlistEntry>, Self::Error>> + Send + '_;

  // ── Backtests ─────────────────────────────────────────────────────────

  /// Insert or refresh each metric keyed by (field, metric), all in one
  /// transaction.
  fn upsert_backtest_metrics(
    &self,
    metrics: Vec<NewBacktestMetric>,
  ) -> impl Future<Output = Result<Vec<BacktestMetric>, Self::Error>> + Send + '_;

  /// List metrics, optionally restricted to one field.
  fn list_backtest_metrics(
    &self,
    field: Option<String>,
  ) -> impl Future<Output = Result<Vec<BacktestMetric>, Self::Error>> + Send + '_;
}
