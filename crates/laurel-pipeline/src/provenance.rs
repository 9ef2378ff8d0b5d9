//! Read-only provenance reference data, keyed by candidate external id.

use std::{collections::HashMap, path::Path};

use laurel_core::prediction::ProvenanceRecord;

use crate::{Error, Result};

pub type ProvenanceIndex = HashMap<String, Vec<ProvenanceRecord>>;

pub async fn load_provenance(path: &Path) -> Result<ProvenanceIndex> {
  let text = tokio::fs::read_to_string(path)
    .await
    .map_err(|e| Error::io("provenance document", path, e))?;
  Ok(serde_json::from_str(&text)?)
}

/// Provenance for one candidate. An external id absent from the document has
/// no provenance, which is not an error.
pub async fn provenance_for(path: &Path, external_id: &str) -> Result<Vec<ProvenanceRecord>> {
  let mut index = load_provenance(path).await?;
  Ok(index.remove(external_id).unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  const DOC: &str = r#"{
    "A1": [
      {"feature_name": "total_citations", "source": "openalex",
       "as_of_date": "2024-06-30", "latency_days": 14},
      {"feature_name": "award_count", "source": "manual",
       "as_of_date": "2024-01-01", "latency_days": 0, "extra_metadata": {"curator": "x"}}
    ]
  }"#;

  #[tokio::test]
  async fn records_are_found_by_external_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("provenance.json");
    tokio::fs::write(&path, DOC).await.unwrap();

    let records = provenance_for(&path, "A1").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].as_of_date, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    assert!(records[0].extra_metadata.is_null());
    assert_eq!(records[1].extra_metadata["curator"], "x");

    assert!(provenance_for(&path, "B2").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn absent_document_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let err = provenance_for(&dir.path().join("provenance.json"), "A1").await.unwrap_err();
    assert!(err.is_not_ready());
  }
}
