//! Pipeline settings, built once per process and shared by every stage.

use std::path::PathBuf;

use chrono::{Datelike as _, Utc};
use laurel_core::candidate::field_slug;
use laurel_model::AttributionMethod;
use serde::{Deserialize, Serialize};

/// Which rows the standard scaler is fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
  /// Every row, before the train/test split. Leaks test-set statistics into
  /// training; kept for output compatibility with earlier artifacts.
  #[default]
  FullMatrix,
  /// Training rows only.
  TrainSplit,
}

/// How predictions are written for a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
  /// Delete the field's predictions, then insert the new set.
  #[default]
  Replace,
  /// Find-or-create each (candidate, year, horizon) row.
  Upsert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Root for staging tables and, unless `seed_dir` is set, seed files.
  pub data_dir:        PathBuf,
  /// Defaults to `{data_dir}/seed`.
  pub seed_dir:        Option<PathBuf>,
  pub model_dir:       PathBuf,
  pub seed:            u64,
  pub test_fraction:   f64,
  pub scaler_fit:      ScalerFit,
  pub attribution:     AttributionMethod,
  pub persist_mode:    PersistMode,
  /// Defaults to the current UTC year.
  pub prediction_year: Option<i32>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      data_dir:        PathBuf::from("storage/data"),
      seed_dir:        None,
      model_dir:       PathBuf::from("storage/models"),
      seed:            42,
      test_fraction:   0.3,
      scaler_fit:      ScalerFit::default(),
      attribution:     AttributionMethod::default(),
      persist_mode:    PersistMode::default(),
      prediction_year: None,
    }
  }
}

impl PipelineConfig {
  pub fn seed_dir(&self) -> PathBuf {
    self.seed_dir.clone().unwrap_or_else(|| self.data_dir.join("seed"))
  }

  pub fn staging_dir(&self) -> PathBuf { self.data_dir.join("staging") }

  /// `{data_dir}/staging/{slug}_features.csv`
  pub fn staging_path(&self, field: &str) -> PathBuf {
    self.staging_dir().join(format!("{}_features.csv", field_slug(field)))
  }

  /// `{model_dir}/{slug}`
  pub fn artifact_dir(&self, field: &str) -> PathBuf { self.model_dir.join(field_slug(field)) }

  /// `{model_dir}/{slug}/{slug}_{name}.{ext}`
  pub fn artifact_path(&self, field: &str, name: &str, ext: &str) -> PathBuf {
    let slug = field_slug(field);
    self.model_dir.join(&slug).join(format!("{slug}_{name}.{ext}"))
  }

  /// `{seed_dir}/provenance.json`
  pub fn provenance_path(&self) -> PathBuf { self.seed_dir().join("provenance.json") }

  pub fn prediction_year(&self) -> i32 {
    self.prediction_year.unwrap_or_else(|| Utc::now().year())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paths_use_field_slug() {
    let config = PipelineConfig {
      data_dir: "/d".into(),
      model_dir: "/m".into(),
      ..PipelineConfig::default()
    };
    assert_eq!(
      config.staging_path("Physiology or Medicine"),
      PathBuf::from("/d/staging/physiology_or_medicine_features.csv")
    );
    assert_eq!(
      config.artifact_path("Physics", "logistic", "json"),
      PathBuf::from("/m/physics/physics_logistic.json")
    );
    assert_eq!(config.seed_dir(), PathBuf::from("/d/seed"));
    assert_eq!(config.provenance_path(), PathBuf::from("/d/seed/provenance.json"));
  }

  #[test]
  fn unsafe_field_names_stay_inside_their_directories() {
    let config = PipelineConfig {
      data_dir: "/d".into(),
      model_dir: "/m".into(),
      ..PipelineConfig::default()
    };
    assert_eq!(
      config.staging_path("Physics/Astro"),
      PathBuf::from("/d/staging/physics_astro_features.csv")
    );
    assert_eq!(config.artifact_dir("../x"), PathBuf::from("/m/___x"));
    assert_eq!(
      config.artifact_path("a\\b", "scaler", "json"),
      PathBuf::from("/m/a_b/a_b_scaler.json")
    );
  }

  #[test]
  fn deserialises_with_defaults() {
    let config: PipelineConfig =
      serde_json::from_str(r#"{"scaler_fit":"train_split","persist_mode":"upsert"}"#).unwrap();
    assert_eq!(config.scaler_fit, ScalerFit::TrainSplit);
    assert_eq!(config.persist_mode, PersistMode::Upsert);
    assert_eq!(config.attribution, AttributionMethod::FixedWeights);
    assert_eq!(config.seed, 42);
    assert_eq!(config.test_fraction, 0.3);
  }

  #[test]
  fn explicit_prediction_year_wins() {
    let config = PipelineConfig { prediction_year: Some(2031), ..PipelineConfig::default() };
    assert_eq!(config.prediction_year(), 2031);
  }
}
