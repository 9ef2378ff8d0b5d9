//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! attribution lists compact JSON arrays.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use laurel_core::{
  candidate::{Candidate, FeatureSnapshot},
  feature::{Feature, FeatureVector},
  prediction::{
    Attribution, BacktestMetric, Horizon, NewPrediction, Prediction,
    ShapAttribution,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_horizon(s: &str) -> Result<Horizon> {
  Horizon::from_str(s).map_err(|_| Error::Decode {
    column: "horizon",
    value:  s.to_owned(),
  })
}

pub fn decode_feature(s: &str) -> Result<Feature> {
  Feature::from_str(s).map_err(|_| Error::Decode {
    column: "feature_name",
    value:  s.to_owned(),
  })
}

// ─── Attributions ────────────────────────────────────────────────────────────

pub fn encode_attributions(attrs: &[Attribution]) -> Result<String> {
  Ok(serde_json::to_string(attrs)?)
}

pub fn decode_attributions(s: &str) -> Result<Vec<Attribution>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Write-side rows ─────────────────────────────────────────────────────────

/// A [`NewPrediction`] with every column already encoded, so the database
/// closure only deals in plain values.
pub struct EncodedPrediction {
  pub prediction_id:   String,
  pub candidate_id:    String,
  pub prediction_year: i32,
  pub horizon:         &'static str,
  pub probability:     f64,
  pub top_features:    String,
  pub attributions:    String,
  /// `(position, feature_name, feature_value, shap_value)`
  pub shap_rows:       Vec<(i64, &'static str, f64, f64)>,
}

impl EncodedPrediction {
  pub fn encode(p: &NewPrediction) -> Result<Self> {
    Ok(Self {
      prediction_id:   encode_uuid(Uuid::new_v4()),
      candidate_id:    encode_uuid(p.candidate_id),
      prediction_year: p.prediction_year,
      horizon:         p.horizon.as_str(),
      probability:     p.probability,
      top_features:    encode_attributions(&p.top_features())?,
      attributions:    encode_attributions(&p.attributions)?,
      shap_rows:       p
        .attributions
        .iter()
        .map(|a| (a.feature.index() as i64, a.feature.name(), a.value, a.contribution))
        .collect(),
    })
  }
}

// ─── Read-side row types ─────────────────────────────────────────────────────

pub const CANDIDATE_COLUMNS: &str = "candidate_id, external_id, full_name, field, \
   affiliation, country, headshot_url, is_laureate, created_at";

/// Raw values read directly from a `candidates` row.
pub struct RawCandidate {
  pub candidate_id: String,
  pub external_id:  String,
  pub full_name:    String,
  pub field:        String,
  pub affiliation:  String,
  pub country:      Option<String>,
  pub headshot_url: Option<String>,
  pub is_laureate:  bool,
  pub created_at:   String,
}

impl RawCandidate {
  /// Map a row selected with [`CANDIDATE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      candidate_id: row.get(0)?,
      external_id:  row.get(1)?,
      full_name:    row.get(2)?,
      field:        row.get(3)?,
      affiliation:  row.get(4)?,
      country:      row.get(5)?,
      headshot_url: row.get(6)?,
      is_laureate:  row.get(7)?,
      created_at:   row.get(8)?,
    })
  }

  pub fn into_candidate(self) -> Result<Candidate> {
    Ok(Candidate {
      candidate_id: decode_uuid(&self.candidate_id)?,
      external_id:  self.external_id,
      full_name:    self.full_name,
      field:        self.field,
      affiliation:  self.affiliation,
      country:      self.country,
      headshot_url: self.headshot_url,
      is_laureate:  self.is_laureate,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const SNAPSHOT_COLUMNS: &str = "snapshot_id, candidate_id, as_of_year, \
   total_citations, h_index, recent_trend, seminal_score, award_count";

/// Raw values read directly from a `feature_snapshots` row.
pub struct RawSnapshot {
  pub snapshot_id:  String,
  pub candidate_id: String,
  pub as_of_year:   i32,
  pub features:     FeatureVector,
}

impl RawSnapshot {
  /// Map a row selected with [`SNAPSHOT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:  row.get(0)?,
      candidate_id: row.get(1)?,
      as_of_year:   row.get(2)?,
      features:     FeatureVector {
        total_citations: row.get(3)?,
        h_index:         row.get(4)?,
        recent_trend:    row.get(5)?,
        seminal_score:   row.get(6)?,
        award_count:     row.get(7)?,
      },
    })
  }

  pub fn into_snapshot(self) -> Result<FeatureSnapshot> {
    Ok(FeatureSnapshot {
      snapshot_id:  decode_uuid(&self.snapshot_id)?,
      candidate_id: decode_uuid(&self.candidate_id)?,
      as_of_year:   self.as_of_year,
      features:     self.features,
    })
  }
}

pub const PREDICTION_COLUMNS: &str = "p.prediction_id, p.candidate_id, \
   p.prediction_year, p.field, p.horizon, p.probability, p.top_features, \
   p.attributions, p.created_at";

/// Raw values read directly from a `predictions` row.
pub struct RawPrediction {
  pub prediction_id:   String,
  pub candidate_id:    String,
  pub prediction_year: i32,
  pub field:           String,
  pub horizon:         String,
  pub probability:     f64,
  pub top_features:    String,
  pub attributions:    String,
  pub created_at:      String,
}

impl RawPrediction {
  /// Map a row selected with [`PREDICTION_COLUMNS`], starting at `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      prediction_id:   row.get(offset)?,
      candidate_id:    row.get(offset + 1)?,
      prediction_year: row.get(offset + 2)?,
      field:           row.get(offset + 3)?,
      horizon:         row.get(offset + 4)?,
      probability:     row.get(offset + 5)?,
      top_features:    row.get(offset + 6)?,
      attributions:    row.get(offset + 7)?,
      created_at:      row.get(offset + 8)?,
    })
  }

  pub fn into_prediction(self) -> Result<Prediction> {
    Ok(Prediction {
      prediction_id:   decode_uuid(&self.prediction_id)?,
      candidate_id:    decode_uuid(&self.candidate_id)?,
      prediction_year: self.prediction_year,
      field:           self.field,
      horizon:         decode_horizon(&self.horizon)?,
      probability:     self.probability,
      top_features:    decode_attributions(&self.top_features)?,
      attributions:    decode_attributions(&self.attributions)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `shap_values` row.
pub struct RawShap {
  pub prediction_id: String,
  pub feature_name:  String,
  pub feature_value: f64,
  pub shap_value:    f64,
}

impl RawShap {
  pub fn into_shap(self) -> Result<ShapAttribution> {
    Ok(ShapAttribution {
      prediction_id: decode_uuid(&self.prediction_id)?,
      feature_name:  decode_feature(&self.feature_name)?,
      feature_value: self.feature_value,
      shap_value:    self.shap_value,
    })
  }
}

/// Raw values read directly from a `backtest_metrics` row.
pub struct RawMetric {
  pub field:      String,
  pub metric:     String,
  pub value:      f64,
  pub details:    String,
  pub updated_at: String,
}

impl RawMetric {
  pub fn into_metric(self) -> Result<BacktestMetric> {
    Ok(BacktestMetric {
      field:      self.field,
      metric:     self.metric,
      value:      self.value,
      details:    serde_json::from_str(&self.details)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
