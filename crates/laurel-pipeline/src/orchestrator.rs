//! Composes the stages into runs and drives the state machine.
//!
//! | Run            | States                                                         |
//! |----------------|----------------------------------------------------------------|
//! | [`run_etl`]    | `Validating → Ingesting → Done` per seed file                  |
//! | [`run_training`] | `Validating → Training → Predicting → Persisting → Done` per staged table |
//! | [`run_batch`]  | every state, for one in-memory batch                           |
//!
//! [`run_etl`]: Pipeline::run_etl
//! [`run_training`]: Pipeline::run_training
//! [`run_batch`]: Pipeline::run_batch

use std::{
  collections::{BTreeMap, HashMap},
  future::Future,
  path::PathBuf,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use laurel_core::{
  candidate::{SeedBatch, field_slug},
  prediction::BacktestMetric,
  store::{IngestSummary, PersistSummary, PredictionStore},
};
use serde::Serialize;
use tracing::{error, info};

use crate::{
  Error, PipelineFailure, Result,
  artifact::ArtifactSet,
  backtest::{BacktestInput, BacktestStage},
  config::PipelineConfig,
  ingest::IngestStage,
  persist::{PersistInput, PersistStage},
  predict::{self, PredictInput, PredictStage},
  quality::{GateInput, QualityGate},
  seed,
  stage::Stage,
  staging::{self, FeatureRow},
  state::{PipelineState, RunReport},
  train::{TrainInput, TrainStage},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FieldEtl {
  pub field:   String,
  pub summary: IngestSummary,
  pub report:  RunReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct EtlOutcome {
  /// `seed-etl-{timestamp}::{field,…}`
  pub run_id: String,
  pub fields: Vec<FieldEtl>,
}

/// What training, prediction and persistence produced for one field.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutcome {
  pub artifacts:        ArtifactSet,
  pub persisted:        PersistSummary,
  pub metrics:          Vec<BacktestMetric>,
  pub predictions_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
  /// `model-{timestamp}`
  pub run_id:           String,
  /// Field → artifact name → path.
  pub model_paths:      BTreeMap<String, BTreeMap<String, PathBuf>>,
  /// Prediction rows written across every field.
  pub prediction_count: usize,
  pub fields:           Vec<(RunReport, ModelOutcome)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
  pub report: RunReport,
  pub ingest: IngestSummary,
  pub model:  ModelOutcome,
}

// ─── Run bookkeeping ─────────────────────────────────────────────────────────

fn run_timestamp() -> String {
  Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn fail(report: &mut RunReport, error: Error) -> PipelineFailure {
  let stage = report.state();
  if stage.can_advance_to(PipelineState::Failed) {
    let _ = report.advance(PipelineState::Failed);
  }
  error!(run_id = %report.run_id, field = %report.field, %stage, %error, "pipeline run failed");
  PipelineFailure { stage, error }
}

fn advance(report: &mut RunReport, next: PipelineState) -> Result<(), PipelineFailure> {
  report.advance(next).map_err(|e| fail(report, e))
}

/// Await `fut` in the report's current state, failing the run on error.
async fn within<T>(
  report: &mut RunReport,
  fut: impl Future<Output = Result<T>>,
) -> Result<T, PipelineFailure> {
  fut.await.map_err(|e| fail(report, e))
}

/// A failure before any run report exists.
fn failed_before_run(stage: PipelineState, error: Error) -> PipelineFailure {
  error!(%stage, %error, "pipeline run failed before start");
  PipelineFailure { stage, error }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Owns the stages and serialises runs per field.
pub struct Pipeline<S> {
  store:    Arc<S>,
  config:   Arc<PipelineConfig>,
  ingest:   IngestStage<S>,
  train:    TrainStage,
  predict:  PredictStage,
  persist:  PersistStage<S>,
  backtest: BacktestStage<S>,
  locks:    Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: PredictionStore> Pipeline<S> {
  pub fn new(store: Arc<S>, config: PipelineConfig) -> Self {
    let config = Arc::new(config);
    Self {
      ingest: IngestStage::new(Arc::clone(&store)),
      train: TrainStage::new(Arc::clone(&config)),
      predict: PredictStage::new(Arc::clone(&config)),
      persist: PersistStage::new(Arc::clone(&store), Arc::clone(&config)),
      backtest: BacktestStage::new(Arc::clone(&store), Arc::clone(&config)),
      locks: Mutex::new(HashMap::new()),
      store,
      config,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  fn field_lock(&self, field: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(field_slug(field)).or_default())
  }

  // ── Runs ──────────────────────────────────────────────────────────────

  /// Ingest every seed file: stage its feature table, gate it, then merge
  /// it into the store. Stops at the first failing field; fields before it
  /// stay committed.
  pub async fn run_etl(&self) -> Result<EtlOutcome, PipelineFailure> {
    let batches = self
      .load_seed_batches()
      .await
      .map_err(|e| failed_before_run(PipelineState::Validating, e))?;

    let names: Vec<&str> = batches.iter().map(SeedBatch::field).collect();
    let run_id = format!("seed-etl-{}::{}", run_timestamp(), names.join(","));
    info!(%run_id, fields = batches.len(), "starting ETL run");

    let mut fields = Vec::with_capacity(batches.len());
    for batch in batches {
      let field = batch.field().to_owned();
      let lock = self.field_lock(&field);
      let _guard = lock.lock().await;

      let mut report = RunReport::new(&run_id, &field);
      let (summary, _) = self.validate_and_ingest(&mut report, batch).await?;
      advance(&mut report, PipelineState::Done)?;
      fields.push(FieldEtl { field, summary, report });
    }

    Ok(EtlOutcome { run_id, fields })
  }

  /// Train, score and persist every staged feature table.
  pub async fn run_training(&self) -> Result<TrainOutcome, PipelineFailure> {
    let run_id = format!("model-{}", run_timestamp());
    let tables = staging::discover_feature_tables(&self.config.staging_dir())
      .await
      .map_err(|e| failed_before_run(PipelineState::Validating, e))?;
    info!(%run_id, tables = tables.len(), "starting training run");

    let mut outcome = TrainOutcome {
      run_id:           run_id.clone(),
      model_paths:      BTreeMap::new(),
      prediction_count: 0,
      fields:           Vec::with_capacity(tables.len()),
    };

    for (slug, path) in tables {
      let lock = self.field_lock(&slug);
      let _guard = lock.lock().await;

      let mut report = RunReport::new(&run_id, &slug);
      advance(&mut report, PipelineState::Validating)?;
      let rows = within(&mut report, async {
        QualityGate.run(GateInput { field: slug.clone(), path: path.clone() }).await?;
        let table = staging::load_feature_table(&path).await?;
        staging::read_feature_rows(&table)
      })
      .await?;

      if let Some(first) = rows.first() {
        report.field = first.field.clone();
      }
      let field = report.field.clone();
      let model = self.model(&mut report, &field, &run_id, rows).await?;
      advance(&mut report, PipelineState::Done)?;

      outcome.prediction_count += model.persisted.inserted + model.persisted.updated;
      outcome.model_paths.insert(field, model.artifacts.paths.clone());
      outcome.fields.push((report, model));
    }

    Ok(outcome)
  }

  /// The whole flow for one in-memory batch, through every state.
  pub async fn run_batch(&self, batch: SeedBatch) -> Result<BatchOutcome, PipelineFailure> {
    let field = batch.field().to_owned();
    let run_id = format!("batch-{}::{}", run_timestamp(), field);
    let lock = self.field_lock(&field);
    let _guard = lock.lock().await;

    let mut report = RunReport::new(&run_id, &field);
    let (ingest, rows) = self.validate_and_ingest(&mut report, batch).await?;
    let model = self.model(&mut report, &field, &run_id, rows).await?;
    advance(&mut report, PipelineState::Done)?;
    Ok(BatchOutcome { report, ingest, model })
  }

  // ── Steps ─────────────────────────────────────────────────────────────

  /// Every non-empty seed batch. Fails before any write if two files share
  /// a field slug, since both would stage to the same table.
  async fn load_seed_batches(&self) -> Result<Vec<SeedBatch>> {
    let mut batches = Vec::new();
    let mut sources: HashMap<String, PathBuf> = HashMap::new();
    for path in seed::discover_seed_files(&self.config.seed_dir()).await? {
      let Some(batch) = seed::load_seed_file(&path).await? else {
        continue;
      };
      if let Some(first) = sources.insert(field_slug(batch.field()), path.clone()) {
        return Err(Error::DuplicateField { field: batch.field().to_owned(), first, second: path });
      }
      batches.push(batch);
    }
    Ok(batches)
  }

  /// `Validating` then `Ingesting`: stage the batch's feature table, gate it,
  /// and merge the batch into the store.
  async fn validate_and_ingest(
    &self,
    report: &mut RunReport,
    batch: SeedBatch,
  ) -> Result<(IngestSummary, Vec<FeatureRow>), PipelineFailure> {
    let field = batch.field().to_owned();
    let path = self.config.staging_path(&field);

    advance(report, PipelineState::Validating)?;
    let rows = within(report, async {
      let table = staging::feature_table(&batch)?;
      staging::write_feature_table(&path, &table).await?;
      QualityGate.run(GateInput { field: field.clone(), path: path.clone() }).await?;
      staging::read_feature_rows(&table)
    })
    .await?;

    advance(report, PipelineState::Ingesting)?;
    let summary = within(report, self.ingest.run(batch)).await?;
    Ok((summary, rows))
  }

  /// `Training`, `Predicting` and `Persisting` for one field's rows.
  async fn model(
    &self,
    report: &mut RunReport,
    field: &str,
    run_id: &str,
    rows: Vec<FeatureRow>,
  ) -> Result<ModelOutcome, PipelineFailure> {
    let labels: Vec<f64> = rows.iter().map(FeatureRow::label).collect();

    advance(report, PipelineState::Training)?;
    let artifacts = within(
      report,
      self.train.run(TrainInput {
        field:  field.to_owned(),
        run_id: run_id.to_owned(),
        rows:   rows.clone(),
      }),
    )
    .await?;

    advance(report, PipelineState::Predicting)?;
    let predictions = within(report, self.predict.run(PredictInput { field: field.to_owned(), rows })).await?;
    let probabilities: Vec<f64> = predictions.iter().map(|p| p.one_year).collect();

    advance(report, PipelineState::Persisting)?;
    let year = self.config.prediction_year();
    let predictions_path = within(
      report,
      predict::write_prediction_artifact(&self.config, field, &predictions, year),
    )
    .await?;
    let persisted = within(
      report,
      self.persist.run(PersistInput { field: field.to_owned(), predictions }),
    )
    .await?;
    let metrics = within(
      report,
      self.backtest.run(BacktestInput {
        field: field.to_owned(),
        run_id: run_id.to_owned(),
        labels,
        probabilities,
      }),
    )
    .await?;

    Ok(ModelOutcome { artifacts, persisted, metrics, predictions_path })
  }
}
