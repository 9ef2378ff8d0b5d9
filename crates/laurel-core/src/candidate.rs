//! Candidates and their feature snapshots, plus the typed seed records that
//! feed ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, feature::FeatureVector};

// ─── Stored entities ─────────────────────────────────────────────────────────

/// A person who may receive an award in a given field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  /// Store-assigned primary key; never changes once created.
  pub candidate_id: Uuid,
  /// Stable identifier from the upstream bibliometric source.
  pub external_id:  String,
  pub full_name:    String,
  pub field:        String,
  pub affiliation:  String,
  pub country:      Option<String>,
  pub headshot_url: Option<String>,
  /// Already-awarded candidates never receive predictions.
  pub is_laureate:  bool,
  pub created_at:   DateTime<Utc>,
}

/// Feature values for one candidate as of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
  pub snapshot_id:  Uuid,
  pub candidate_id: Uuid,
  pub as_of_year:   i32,
  pub features:     FeatureVector,
}

/// A candidate bundled with its most recent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDetail {
  pub candidate: Candidate,
  pub snapshot:  FeatureSnapshot,
}

// ─── Seed input ──────────────────────────────────────────────────────────────

/// The nested feature payload of a seed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedFeatures {
  pub as_of_year: i32,
  #[serde(flatten)]
  pub values:     FeatureVector,
}

/// One candidate object from a seed file, typed immediately after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
  #[serde(alias = "openalex_id")]
  pub external_id:  String,
  pub full_name:    String,
  pub field:        String,
  pub affiliation:  String,
  #[serde(default)]
  pub country:      Option<String>,
  #[serde(default)]
  pub headshot_url: Option<String>,
  #[serde(default)]
  pub is_laureate:  bool,
  pub features:     SeedFeatures,
}

/// A non-empty set of seed records that all share one field.
///
/// Construction is the only place the single-field contract is checked, so a
/// `SeedBatch` reaching the store is already known to be homogeneous.
#[derive(Debug, Clone)]
pub struct SeedBatch {
  field:   String,
  records: Vec<SeedRecord>,
}

impl SeedBatch {
  pub fn new(records: Vec<SeedRecord>) -> Result<Self> {
    let field = records.first().ok_or(Error::EmptyBatch)?.field.clone();
    if let Some(other) = records.iter().find(|r| r.field != field) {
      return Err(Error::MixedFields {
        expected: field,
        found:    other.field.clone(),
      });
    }
    Ok(Self { field, records })
  }

  /// Parse a JSON array of seed records and validate it as a batch.
  pub fn from_json(input: &str) -> Result<Self> {
    let records: Vec<SeedRecord> = serde_json::from_str(input)?;
    Self::new(records)
  }

  pub fn field(&self) -> &str { &self.field }

  pub fn records(&self) -> &[SeedRecord] { &self.records }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  pub fn into_records(self) -> Vec<SeedRecord> { self.records }
}

/// Filesystem-safe form of a field name: `"Physiology or Medicine"` →
/// `"physiology_or_medicine"`. Anything outside `[a-z0-9_-]` after
/// lowercasing becomes `_`, so a slug never names another directory.
pub fn field_slug(field: &str) -> String {
  field
    .trim()
    .to_lowercase()
    .chars()
    .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' { c } else { '_' })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  const SEED: &str = r#"[
    {
      "openalex_id": "A123",
      "full_name": "Lene Hau",
      "field": "Physics",
      "affiliation": "Harvard University",
      "headshot_url": "https://example.com/hau.jpg",
      "features": {
        "as_of_year": 2024,
        "total_citations": 12000,
        "h_index": 65,
        "recent_trend": 0.82,
        "seminal_score": 0.9,
        "award_count": 4
      }
    },
    {
      "external_id": "A789",
      "full_name": "Alain Aspect",
      "field": "Physics",
      "affiliation": "Institut d'Optique",
      "is_laureate": true,
      "features": {
        "as_of_year": 2024,
        "total_citations": 22000,
        "h_index": 90,
        "recent_trend": 0.88,
        "seminal_score": 0.95,
        "award_count": 6
      }
    }
  ]"#;

  #[test]
  fn parses_seed_with_alias_and_defaults() {
    let batch = SeedBatch::from_json(SEED).unwrap();
    assert_eq!(batch.field(), "Physics");
    assert_eq!(batch.len(), 2);

    let first = &batch.records()[0];
    assert_eq!(first.external_id, "A123");
    assert!(!first.is_laureate);
    assert_eq!(first.country, None);
    assert_eq!(first.features.as_of_year, 2024);
    assert_eq!(first.features.values.total_citations, 12_000);
    assert!(batch.records()[1].is_laureate);
  }

  #[test]
  fn mixed_fields_are_rejected() {
    let mut records = SeedBatch::from_json(SEED).unwrap().into_records();
    records[1].field = "Chemistry".into();
    let err = SeedBatch::new(records).unwrap_err();
    assert!(matches!(
      err,
      Error::MixedFields { ref expected, ref found } if expected == "Physics" && found == "Chemistry"
    ));
  }

  #[test]
  fn empty_batch_is_rejected() {
    assert!(matches!(SeedBatch::new(Vec::new()), Err(Error::EmptyBatch)));
  }

  #[test]
  fn missing_feature_is_a_parse_error() {
    let input = r#"[{"external_id":"X","full_name":"X","field":"Physics",
      "affiliation":"Y","features":{"as_of_year":2024,"total_citations":1}}]"#;
    assert!(matches!(SeedBatch::from_json(input), Err(Error::Serialization(_))));
  }

  #[test]
  fn slug_lowercases_and_replaces_spaces() {
    assert_eq!(field_slug("Physiology or Medicine"), "physiology_or_medicine");
    assert_eq!(field_slug("Physics"), "physics");
  }

  #[test]
  fn slug_never_contains_path_separators() {
    assert_eq!(field_slug("Physics/Astro"), "physics_astro");
    assert_eq!(field_slug("../x"), "___x");
    assert_eq!(field_slug("Econ\\omics"), "econ_omics");
    assert_eq!(field_slug("Économie"), "_conomie");
    for field in ["a/b", "..", "c\\d", "e:f"] {
      let slug = field_slug(field);
      assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'), "{slug}");
    }
  }
}
