//! Model artifacts on disk and the manifest that pins them.
//!
//! Training writes one JSON file per artifact and then a manifest recording
//! each file's SHA-256. Prediction refuses to load an artifact whose bytes no
//! longer match the manifest, or a manifest whose feature order differs from
//! [`Feature::ALL`].

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use laurel_core::feature::Feature;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
  Error, Result,
  config::{PipelineConfig, ScalerFit},
};

pub const SCALER_ARTIFACT: &str = "scaler";
pub const MANIFEST_ARTIFACT: &str = "manifest";
pub const METRICS_ARTIFACT: &str = "metrics";
pub const PREDICTIONS_ARTIFACT: &str = "predictions";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
  /// File name within the field's artifact directory.
  pub file:   String,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
  pub field:      String,
  pub run_id:     String,
  pub trained_at: DateTime<Utc>,
  /// Column order the scaler and models were fitted with.
  pub features:   Vec<String>,
  pub scaler_fit: ScalerFit,
  pub rows:       usize,
  pub train_rows: usize,
  pub test_rows:  usize,
  pub artifacts:  BTreeMap<String, ArtifactEntry>,
}

impl ArtifactManifest {
  pub fn feature_names() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.name().to_owned()).collect()
  }
}

/// What a training run left on disk for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSet {
  pub field:    String,
  pub manifest: PathBuf,
  /// Artifact name → path.
  pub paths:    BTreeMap<String, PathBuf>,
}

pub(crate) async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| Error::io("artifact directory", parent, e))?;
  }
  tokio::fs::write(path, bytes)
    .await
    .map_err(|e| Error::io("artifact", path, e))
}

/// Serialise `value` as pretty JSON to `path`, returning its manifest entry.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<ArtifactEntry> {
  let bytes = serde_json::to_vec_pretty(value)?;
  write_bytes(path, &bytes).await?;
  debug!(?path, bytes = bytes.len(), "wrote artifact");
  Ok(ArtifactEntry {
    file:   path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default(),
    sha256: sha256_hex(&bytes),
  })
}

pub async fn read_manifest(config: &PipelineConfig, field: &str) -> Result<ArtifactManifest> {
  let path = config.artifact_path(field, MANIFEST_ARTIFACT, "json");
  let bytes = tokio::fs::read(&path)
    .await
    .map_err(|e| Error::io("model manifest", &path, e))?;
  let manifest: ArtifactManifest = serde_json::from_slice(&bytes)?;

  if manifest.features != ArtifactManifest::feature_names() {
    return Err(Error::ArtifactMismatch {
      name: MANIFEST_ARTIFACT.into(),
      path,
      reason: format!("feature order {:?} differs from the tracked features", manifest.features),
    });
  }
  Ok(manifest)
}

/// Read artifact `name` for the manifest's field, check its hash and parse it.
pub async fn read_verified<T: DeserializeOwned>(
  config: &PipelineConfig,
  manifest: &ArtifactManifest,
  name: &str,
) -> Result<T> {
  let path = config.artifact_path(&manifest.field, name, "json");
  let mismatch = |path: PathBuf, reason: String| Error::ArtifactMismatch { name: name.to_owned(), path, reason };

  let entry = manifest
    .artifacts
    .get(name)
    .ok_or_else(|| mismatch(path.clone(), "not listed in manifest".into()))?;
  let bytes = tokio::fs::read(&path)
    .await
    .map_err(|e| Error::io("model artifact", &path, e))?;

  let actual = sha256_hex(&bytes);
  if actual != entry.sha256 {
    return Err(mismatch(path, format!("sha256 {actual} != recorded {}", entry.sha256)));
  }
  Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig { model_dir: dir.to_owned(), ..PipelineConfig::default() }
  }

  fn manifest(artifacts: BTreeMap<String, ArtifactEntry>) -> ArtifactManifest {
    ArtifactManifest {
      field: "Physics".into(),
      run_id: "r".into(),
      trained_at: Utc::now(),
      features: ArtifactManifest::feature_names(),
      scaler_fit: ScalerFit::TrainSplit,
      rows: 3,
      train_rows: 2,
      test_rows: 1,
      artifacts,
    }
  }

  #[test]
  fn sha256_of_empty_input() {
    assert_eq!(
      sha256_hex(b""),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }

  #[tokio::test]
  async fn verified_read_rejects_tampered_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let path = config.artifact_path("Physics", "numbers", "json");
    let entry = write_json(&path, &vec![1.0_f64, 2.5]).await.unwrap();
    assert_eq!(entry.file, "physics_numbers.json");

    let manifest = manifest(BTreeMap::from([("numbers".to_owned(), entry)]));
    let back: Vec<f64> = read_verified(&config, &manifest, "numbers").await.unwrap();
    assert_eq!(back, [1.0, 2.5]);

    tokio::fs::write(&path, "[1.0, 3.0]").await.unwrap();
    let err = read_verified::<Vec<f64>>(&config, &manifest, "numbers").await.unwrap_err();
    assert!(matches!(err, Error::ArtifactMismatch { .. }));
    assert!(err.is_not_ready());

    let err = read_verified::<Vec<f64>>(&config, &manifest, "absent").await.unwrap_err();
    assert!(matches!(err, Error::ArtifactMismatch { .. }));
  }

  #[tokio::test]
  async fn manifest_with_reordered_features_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut m = manifest(BTreeMap::new());
    m.features.reverse();
    write_json(&config.artifact_path("Physics", MANIFEST_ARTIFACT, "json"), &m)
      .await
      .unwrap();

    let err = read_manifest(&config, "Physics").await.unwrap_err();
    assert!(matches!(err, Error::ArtifactMismatch { .. }));
  }

  #[tokio::test]
  async fn absent_manifest_is_a_missing_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_manifest(&config(dir.path()), "Physics").await.unwrap_err();
    assert!(matches!(err, Error::MissingDependency { what: "model manifest", .. }));
  }
}
