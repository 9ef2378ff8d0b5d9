//! Loads a field's verified artifacts and scores its candidates.

use std::{path::PathBuf, sync::Arc};

use laurel_core::{
  feature::{FEATURE_COUNT, Feature},
  prediction::{Attribution, TOP_FEATURES, select_top, three_year_probability},
};
use laurel_model::{
  AttributionMethod, Ensemble, FittedModel, Matrix, Member, ModelKind, StandardScaler,
  attribution::{coefficient_attributions, fixed_weight_attributions},
};
use laurel_table::Table;
use serde::Serialize;
use tracing::info;

use crate::{
  Error, Result,
  artifact::{self, ArtifactManifest, PREDICTIONS_ARTIFACT, SCALER_ARTIFACT},
  config::PipelineConfig,
  stage::Stage,
  staging::FeatureRow,
};

/// Scores and attributions for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePrediction {
  pub external_id:          String,
  pub field:                String,
  pub as_of_year:           i32,
  pub is_laureate:          bool,
  /// Ensemble mean.
  pub one_year:             f64,
  pub three_year:           f64,
  pub member_probabilities: Vec<(ModelKind, f64)>,
  /// Every tracked feature, in tracked-feature order.
  pub attributions:         Vec<Attribution>,
  pub top_features:         Vec<Attribution>,
}

/// A field's scaler and ensemble, loaded from verified artifacts.
#[derive(Debug, Clone)]
pub struct LoadedModels {
  pub manifest: ArtifactManifest,
  pub scaler:   StandardScaler,
  pub ensemble: Ensemble,
}

impl LoadedModels {
  pub async fn load(config: &PipelineConfig, field: &str) -> Result<Self> {
    let manifest = artifact::read_manifest(config, field).await?;
    let mismatch = |name: &str, reason: String| Error::ArtifactMismatch {
      name: name.to_owned(),
      path: config.artifact_path(field, name, "json"),
      reason,
    };

    let scaler: StandardScaler = artifact::read_verified(config, &manifest, SCALER_ARTIFACT).await?;
    if scaler.n_features() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
      return Err(mismatch(SCALER_ARTIFACT, format!("expected {FEATURE_COUNT} features")));
    }

    let mut members = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
      let name = kind.artifact_name();
      let model: FittedModel = artifact::read_verified(config, &manifest, name).await?;
      if !model.is_kind(kind) {
        return Err(mismatch(name, format!("holds a model that is not {name}")));
      }
      model.validate(FEATURE_COUNT).map_err(|e| mismatch(name, e.to_string()))?;
      members.push(Member { kind, model });
    }

    Ok(Self { manifest, scaler, ensemble: Ensemble { members } })
  }

  /// Score every row. Laureates are scored too; the persister drops them.
  pub fn predict(&self, rows: &[FeatureRow], method: AttributionMethod) -> Result<Vec<CandidatePrediction>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }
    let raw = Matrix::from_rows(&rows.iter().map(|r| r.features.to_array()).collect::<Vec<_>>())?;
    let x = self.scaler.transform(&raw)?;
    let output = self.ensemble.predict(&x);
    let logistic = self.ensemble.member(ModelKind::Logistic).and_then(FittedModel::as_logistic);

    rows
      .iter()
      .enumerate()
      .map(|(i, row)| -> Result<CandidatePrediction> {
        let attributions = match method {
          AttributionMethod::FixedWeights => fixed_weight_attributions(&row.features),
          AttributionMethod::LogisticCoefficients => {
            let model = logistic.ok_or_else(|| laurel_model::Error::InvalidParameter {
              name:   "attribution",
              reason: "ensemble has no logistic member".into(),
            })?;
            coefficient_attributions(model, &row.features, x.row(i))?
          }
        };
        let one_year = output.mean[i];
        Ok(CandidatePrediction {
          external_id: row.external_id.clone(),
          field: row.field.clone(),
          as_of_year: row.as_of_year,
          is_laureate: row.is_laureate,
          one_year,
          three_year: three_year_probability(one_year),
          member_probabilities: output.members.iter().map(|(kind, p)| (*kind, p[i])).collect(),
          top_features: select_top(&attributions, TOP_FEATURES),
          attributions,
        })
      })
      .collect()
  }
}

pub struct PredictInput {
  pub field: String,
  pub rows:  Vec<FeatureRow>,
}

pub struct PredictStage {
  config: Arc<PipelineConfig>,
}

impl PredictStage {
  pub fn new(config: Arc<PipelineConfig>) -> Self { Self { config } }
}

impl Stage for PredictStage {
  type Input = PredictInput;
  type Output = Vec<CandidatePrediction>;

  async fn run(&self, input: PredictInput) -> Result<Vec<CandidatePrediction>> {
    let models = LoadedModels::load(&self.config, &input.field).await?;
    let predictions = models.predict(&input.rows, self.config.attribution)?;
    info!(field = %input.field, candidates = predictions.len(), method = ?self.config.attribution, "scored candidates");
    Ok(predictions)
  }
}

// ─── Prediction artifact ─────────────────────────────────────────────────────

/// `external_id, field, prediction_year, probability_one_year,
/// probability_three_year, attr_<feature>…`
pub fn prediction_table(predictions: &[CandidatePrediction], year: i32) -> Result<Table> {
  let mut header: Vec<String> = [
    "external_id",
    "field",
    "prediction_year",
    "probability_one_year",
    "probability_three_year",
  ]
  .map(String::from)
  .to_vec();
  header.extend(Feature::ALL.iter().map(|f| format!("attr_{}", f.name())));

  let mut table = Table::new(header)?;
  for p in predictions {
    let mut row = vec![
      p.external_id.clone(),
      p.field.clone(),
      year.to_string(),
      p.one_year.to_string(),
      p.three_year.to_string(),
    ];
    row.extend(Feature::ALL.iter().map(|f| {
      p.attributions
        .iter()
        .find(|a| a.feature == *f)
        .map(|a| a.contribution.to_string())
        .unwrap_or_default()
    }));
    table.push_row(row)?;
  }
  Ok(table)
}

pub async fn write_prediction_artifact(
  config: &PipelineConfig,
  field: &str,
  predictions: &[CandidatePrediction],
  year: i32,
) -> Result<PathBuf> {
  let path = config.artifact_path(field, PREDICTIONS_ARTIFACT, "csv");
  let table = prediction_table(predictions, year)?;
  artifact::write_bytes(&path, laurel_table::serialize(&table).as_bytes()).await?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use laurel_core::feature::FeatureVector;

  use super::*;
  use crate::train::{TrainInput, TrainStage};

  fn row(id: &str, laureate: bool, citations: i64, seminal: f64) -> FeatureRow {
    FeatureRow {
      external_id: id.into(),
      field:       "Chemistry".into(),
      is_laureate: laureate,
      as_of_year:  2024,
      features:    FeatureVector {
        total_citations: citations,
        h_index:         citations as f64 / 500.0,
        recent_trend:    0.3,
        seminal_score:   seminal,
        award_count:     2,
      },
    }
  }

  fn rows() -> Vec<FeatureRow> {
    vec![
      row("C1", true, 40_000, 0.95),
      row("C2", false, 9_000, 0.4),
      row("C3", false, 12_000, 0.5),
      row("C4", true, 35_000, 0.9),
      row("C5", false, 3_000, 0.1),
      row("C6", false, 18_000, 0.6),
    ]
  }

  async fn trained(dir: &std::path::Path, attribution: AttributionMethod) -> Arc<PipelineConfig> {
    let config = Arc::new(PipelineConfig {
      model_dir: dir.to_owned(),
      attribution,
      ..PipelineConfig::default()
    });
    TrainStage::new(Arc::clone(&config))
      .run(TrainInput { field: "Chemistry".into(), run_id: "r".into(), rows: rows() })
      .await
      .unwrap();
    config
  }

  #[tokio::test]
  async fn predictions_are_bounded_and_explained() {
    let dir = tempfile::tempdir().unwrap();
    let config = trained(dir.path(), AttributionMethod::FixedWeights).await;

    let predictions = PredictStage::new(config)
      .run(PredictInput { field: "Chemistry".into(), rows: rows() })
      .await
      .unwrap();

    assert_eq!(predictions.len(), 6);
    for p in &predictions {
      assert!((0.0..=1.0).contains(&p.one_year));
      assert_eq!(p.three_year, (p.one_year * 1.5).min(1.0));
      assert_eq!(p.attributions.len(), 5);
      assert!(p.top_features.len() <= 5);

      let members: Vec<f64> = p.member_probabilities.iter().map(|(_, v)| *v).collect();
      assert_eq!(members.len(), 3);
      assert!((p.one_year - members.iter().sum::<f64>() / 3.0).abs() < 1e-12);
    }
    // Fixed weights: 0.2 · 0.3 for recent_trend.
    let trend = predictions[0]
      .attributions
      .iter()
      .find(|a| a.feature == Feature::RecentTrend)
      .unwrap();
    assert!((trend.contribution - 0.06).abs() < 1e-12);
  }

  #[tokio::test]
  async fn coefficient_attribution_uses_the_logistic_member() {
    let dir = tempfile::tempdir().unwrap();
    let config = trained(dir.path(), AttributionMethod::LogisticCoefficients).await;
    let models = LoadedModels::load(&config, "Chemistry").await.unwrap();
    let predictions = models.predict(&rows(), AttributionMethod::LogisticCoefficients).unwrap();

    let logistic = models.ensemble.member(ModelKind::Logistic).and_then(FittedModel::as_logistic).unwrap();
    let standardised = models.scaler.transform_row(&rows()[0].features.to_array()).unwrap();
    for a in &predictions[0].attributions {
      let i = a.feature.index();
      assert!((a.contribution - logistic.coefficients[i] * standardised[i]).abs() < 1e-12);
    }
  }

  #[tokio::test]
  async fn missing_artifacts_are_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig { model_dir: dir.path().to_owned(), ..PipelineConfig::default() };
    let err = LoadedModels::load(&config, "Chemistry").await.unwrap_err();
    assert!(err.is_not_ready());
  }

  #[tokio::test]
  async fn deleted_member_artifact_is_a_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let config = trained(dir.path(), AttributionMethod::FixedWeights).await;
    tokio::fs::remove_file(config.artifact_path("Chemistry", "boosted_wide", "json"))
      .await
      .unwrap();
    let err = LoadedModels::load(&config, "Chemistry").await.unwrap_err();
    assert!(matches!(err, Error::MissingDependency { what: "model artifact", .. }));
  }

  #[tokio::test]
  async fn member_artifact_of_the_wrong_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = trained(dir.path(), AttributionMethod::FixedWeights).await;

    // Put the logistic model where the wide booster belongs, hash and all.
    let logistic = tokio::fs::read(config.artifact_path("Chemistry", "logistic", "json")).await.unwrap();
    tokio::fs::write(config.artifact_path("Chemistry", "boosted_wide", "json"), &logistic)
      .await
      .unwrap();
    let mut manifest = artifact::read_manifest(&config, "Chemistry").await.unwrap();
    let sha256 = manifest.artifacts["logistic"].sha256.clone();
    manifest.artifacts.get_mut("boosted_wide").unwrap().sha256 = sha256;
    artifact::write_json(&config.artifact_path("Chemistry", "manifest", "json"), &manifest)
      .await
      .unwrap();

    let err = LoadedModels::load(&config, "Chemistry").await.unwrap_err();
    assert!(matches!(err, Error::ArtifactMismatch { ref name, .. } if name == "boosted_wide"));
  }

  #[test]
  fn prediction_table_has_attribution_columns() {
    let p = CandidatePrediction {
      external_id:          "C1".into(),
      field:                "Chemistry".into(),
      as_of_year:           2024,
      is_laureate:          false,
      one_year:             0.5,
      three_year:           0.75,
      member_probabilities: Vec::new(),
      attributions:         fixed_weight_attributions(&rows()[1].features),
      top_features:         Vec::new(),
    };
    let table = prediction_table(&[p], 2025).unwrap();
    assert_eq!(table.header().len(), 10);
    assert_eq!(table.header()[5], "attr_total_citations");
    assert_eq!(table.rows()[0][2], "2025");
    assert_eq!(table.rows()[0][4], "0.75");
  }
}
