//! Fits the ensemble for one field and writes its artifacts.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use laurel_model::{
  Ensemble, EnsembleConfig, Matrix, StandardScaler, Split, fit_ensemble, train_test_split,
};
use tracing::{info, warn};

use crate::{
  Result,
  artifact::{self, ArtifactManifest, ArtifactSet, MANIFEST_ARTIFACT, SCALER_ARTIFACT},
  config::{PipelineConfig, ScalerFit},
  stage::Stage,
  staging::FeatureRow,
};

pub struct TrainInput {
  pub field:  String,
  pub run_id: String,
  pub rows:   Vec<FeatureRow>,
}

/// The in-memory result of a fit, before anything touches disk.
#[derive(Debug, Clone)]
pub struct TrainedModels {
  pub scaler:   StandardScaler,
  pub ensemble: Ensemble,
  pub split:    Split,
}

/// Standardise, split and fit all three members. CPU-bound; callers on the
/// async runtime should go through [`TrainStage`].
pub fn fit_models(rows: &[FeatureRow], config: &PipelineConfig) -> Result<TrainedModels> {
  let x = Matrix::from_rows(&rows.iter().map(|r| r.features.to_array()).collect::<Vec<_>>())?;
  let y: Vec<f64> = rows.iter().map(FeatureRow::label).collect();
  let split = train_test_split(x.n_rows(), config.test_fraction, config.seed)?;

  let x_train = x.select_rows(&split.train);
  let scaler = match config.scaler_fit {
    ScalerFit::FullMatrix => {
      warn!(
        rows = x.n_rows(),
        "fitting scaler on the full matrix; test rows leak into training statistics"
      );
      StandardScaler::fit(&x)
    }
    ScalerFit::TrainSplit => StandardScaler::fit(&x_train),
  };

  let x_train = scaler.transform(&x_train)?;
  let y_train: Vec<f64> = split.train.iter().map(|&i| y[i]).collect();
  let ensemble_config = EnsembleConfig { seed: config.seed, ..EnsembleConfig::default() };
  let ensemble = fit_ensemble(&x_train, &y_train, &ensemble_config)?;

  Ok(TrainedModels { scaler, ensemble, split })
}

pub struct TrainStage {
  config: Arc<PipelineConfig>,
}

impl TrainStage {
  pub fn new(config: Arc<PipelineConfig>) -> Self { Self { config } }
}

impl Stage for TrainStage {
  type Input = TrainInput;
  type Output = ArtifactSet;

  async fn run(&self, input: TrainInput) -> Result<ArtifactSet> {
    let TrainInput { field, run_id, rows } = input;
    let n_rows = rows.len();

    let config = Arc::clone(&self.config);
    let trained = tokio::task::spawn_blocking(move || fit_models(&rows, &config)).await??;

    let mut entries = BTreeMap::new();
    let mut paths = BTreeMap::new();

    let scaler_path = self.config.artifact_path(&field, SCALER_ARTIFACT, "json");
    entries.insert(SCALER_ARTIFACT.to_owned(), artifact::write_json(&scaler_path, &trained.scaler).await?);
    paths.insert(SCALER_ARTIFACT.to_owned(), scaler_path);

    for member in &trained.ensemble.members {
      let name = member.kind.artifact_name();
      let path = self.config.artifact_path(&field, name, "json");
      entries.insert(name.to_owned(), artifact::write_json(&path, &member.model).await?);
      paths.insert(name.to_owned(), path);
    }

    let manifest = ArtifactManifest {
      field: field.clone(),
      run_id,
      trained_at: Utc::now(),
      features: ArtifactManifest::feature_names(),
      scaler_fit: self.config.scaler_fit,
      rows: n_rows,
      train_rows: trained.split.train.len(),
      test_rows: trained.split.test.len(),
      artifacts: entries,
    };
    let manifest_path = self.config.artifact_path(&field, MANIFEST_ARTIFACT, "json");
    artifact::write_json(&manifest_path, &manifest).await?;

    info!(
      %field,
      rows = n_rows,
      train_rows = manifest.train_rows,
      dir = ?self.config.artifact_dir(&field),
      "trained ensemble"
    );
    Ok(ArtifactSet { field, manifest: manifest_path, paths })
  }
}
