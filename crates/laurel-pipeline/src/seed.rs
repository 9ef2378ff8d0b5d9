//! Seed file discovery and parsing.

use std::path::{Path, PathBuf};

use laurel_core::candidate::{SeedBatch, SeedRecord};
use tracing::{info, warn};

use crate::{Error, Result};

const SEED_SUFFIX: &str = "_candidates.json";

/// Every `*_candidates.json` file in `dir`, sorted by path.
pub async fn discover_seed_files(dir: &Path) -> Result<Vec<PathBuf>> {
  let mut entries = tokio::fs::read_dir(dir)
    .await
    .map_err(|e| Error::io("seed directory", dir, e))?;

  let mut files = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io("seed directory", dir, e))? {
    let path = entry.path();
    if let Some(name) = path.file_name().and_then(|n| n.to_str())
      && name.ends_with(SEED_SUFFIX)
    {
      files.push(path);
    }
  }

  if files.is_empty() {
    return Err(Error::MissingDependency { what: "seed files", path: dir.to_owned() });
  }
  files.sort();
  info!(count = files.len(), ?dir, "discovered seed files");
  Ok(files)
}

/// Parse one seed file. An empty array yields `None`; anything else must form
/// a valid single-field batch.
pub async fn load_seed_file(path: &Path) -> Result<Option<SeedBatch>> {
  let text = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| Error::io("seed file", path, e))?;
  let records: Vec<SeedRecord> = serde_json::from_str(&text)?;
  if records.is_empty() {
    warn!(?path, "seed file is empty, skipping");
    return Ok(None);
  }
  Ok(Some(SeedBatch::new(records)?))
}

#[cfg(test)]
mod tests {
  use super::*;

  const PHYSICS: &str = r#"[{
    "openalex_id": "A1", "full_name": "Ada", "field": "Physics", "affiliation": "X",
    "features": {"as_of_year": 2024, "total_citations": 10, "h_index": 2,
                 "recent_trend": 0.1, "seminal_score": 0.2, "award_count": 0}
  }]"#;

  #[tokio::test]
  async fn discovers_only_candidate_files_in_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["physics_candidates.json", "chemistry_candidates.json", "provenance.json"] {
      tokio::fs::write(dir.path().join(name), "[]").await.unwrap();
    }
    let files = discover_seed_files(dir.path()).await.unwrap();
    let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
    assert_eq!(names, ["chemistry_candidates.json", "physics_candidates.json"]);
  }

  #[tokio::test]
  async fn no_seed_files_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    assert!(discover_seed_files(dir.path()).await.unwrap_err().is_not_ready());
    assert!(discover_seed_files(&dir.path().join("absent")).await.unwrap_err().is_not_ready());
  }

  #[tokio::test]
  async fn empty_file_is_skipped_and_records_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty_candidates.json");
    let physics = dir.path().join("physics_candidates.json");
    tokio::fs::write(&empty, "[]").await.unwrap();
    tokio::fs::write(&physics, PHYSICS).await.unwrap();

    assert!(load_seed_file(&empty).await.unwrap().is_none());
    let batch = load_seed_file(&physics).await.unwrap().unwrap();
    assert_eq!(batch.field(), "Physics");
    assert_eq!(batch.records()[0].external_id, "A1");
  }

  #[tokio::test]
  async fn malformed_json_is_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_candidates.json");
    tokio::fs::write(&path, "{not json").await.unwrap();
    assert!(load_seed_file(&path).await.unwrap_err().is_bad_input());
  }
}
