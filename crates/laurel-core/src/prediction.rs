//! Predictions, attributions, backtest metrics and provenance records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::feature::Feature;

/// Number of attributions kept as "top features" for each prediction.
pub const TOP_FEATURES: usize = 5;

// ─── Horizon ─────────────────────────────────────────────────────────────────

/// The prediction time window.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Horizon {
  OneYear,
  ThreeYear,
}

impl Horizon {
  pub const ALL: [Horizon; 2] = [Horizon::OneYear, Horizon::ThreeYear];

  pub fn as_str(self) -> &'static str { self.into() }
}

/// Extrapolate the three-year probability from the one-year ensemble output.
pub fn three_year_probability(one_year: f64) -> f64 {
  (one_year * 1.5).clamp(0.0, 1.0)
}

// ─── Attribution ─────────────────────────────────────────────────────────────

/// One feature's contribution to a candidate's prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
  pub feature:      Feature,
  pub value:        f64,
  pub contribution: f64,
}

/// The `k` attributions with the largest absolute contribution, largest
/// first. Equal magnitudes keep their input order.
pub fn select_top(attributions: &[Attribution], k: usize) -> Vec<Attribution> {
  let mut ranked = attributions.to_vec();
  // `sort_by` is stable, which gives the tie-break for free.
  ranked.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
  ranked.truncate(k);
  ranked
}

// ─── Prediction ──────────────────────────────────────────────────────────────

/// A persisted probability for one (candidate, year, horizon).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
  pub prediction_id:   Uuid,
  pub candidate_id:    Uuid,
  pub prediction_year: i32,
  pub field:           String,
  pub horizon:         Horizon,
  pub probability:     f64,
  /// Up to [`TOP_FEATURES`] attributions ordered by descending magnitude.
  pub top_features:    Vec<Attribution>,
  /// One attribution per tracked feature.
  pub attributions:    Vec<Attribution>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::PredictionStore::replace_predictions`] and
/// [`crate::store::PredictionStore::upsert_predictions`].
#[derive(Debug, Clone)]
pub struct NewPrediction {
  pub candidate_id:    Uuid,
  pub prediction_year: i32,
  pub horizon:         Horizon,
  pub probability:     f64,
  pub attributions:    Vec<Attribution>,
}

impl NewPrediction {
  pub fn top_features(&self) -> Vec<Attribution> {
    select_top(&self.attributions, TOP_FEATURES)
  }
}

/// A child attribution row of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapAttribution {
  pub prediction_id: Uuid,
  pub feature_name:  Feature,
  pub feature_value: f64,
  pub shap_value:    f64,
}

/// A prediction joined with the candidate it belongs to, as shown on a
/// shortlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortlistEntry {
  pub candidate_id:   Uuid,
  pub candidate_name: String,
  pub affiliation:    String,
  pub field:          String,
  pub headshot_url:   Option<String>,
  pub probability:    f64,
  pub horizon:        Horizon,
  pub year:           i32,
  pub shap_values:    Vec<ShapAttribution>,
  pub top_features:   Vec<Attribution>,
}

// ─── Backtests ───────────────────────────────────────────────────────────────

/// A retrospective accuracy measure for one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetric {
  pub field:      String,
  pub metric:     String,
  pub value:      f64,
  pub details:    serde_json::Value,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBacktestMetric {
  pub field:   String,
  pub metric:  String,
  pub value:   f64,
  pub details: serde_json::Value,
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Where and when a feature value was sourced. Reference data only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
  pub feature_name:   String,
  pub source:         String,
  pub as_of_date:     NaiveDate,
  pub latency_days:   u32,
  #[serde(default)]
  pub extra_metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn attr(feature: Feature, contribution: f64) -> Attribution {
    Attribution { feature, value: 1.0, contribution }
  }

  #[test]
  fn three_year_is_clipped() {
    assert_eq!(three_year_probability(0.8), 1.0);
    assert!((three_year_probability(0.2) - 0.3).abs() < 1e-12);
    assert_eq!(three_year_probability(0.0), 0.0);
  }

  #[test]
  fn top_orders_by_absolute_magnitude() {
    let attrs = [
      attr(Feature::TotalCitations, 0.12),
      attr(Feature::HIndex, -0.5),
      attr(Feature::RecentTrend, 0.2),
      attr(Feature::SeminalScore, 0.01),
      attr(Feature::AwardCount, -0.3),
    ];
    let top = select_top(&attrs, 3);
    let names: Vec<_> = top.iter().map(|a| a.feature).collect();
    assert_eq!(names, [Feature::HIndex, Feature::AwardCount, Feature::RecentTrend]);
  }

  #[test]
  fn top_ties_keep_input_order() {
    let attrs = [
      attr(Feature::SeminalScore, 0.2),
      attr(Feature::TotalCitations, -0.2),
      attr(Feature::HIndex, 0.2),
    ];
    let top = select_top(&attrs, 5);
    let names: Vec<_> = top.iter().map(|a| a.feature).collect();
    assert_eq!(names, [Feature::SeminalScore, Feature::TotalCitations, Feature::HIndex]);
  }

  #[test]
  fn top_never_exceeds_k() {
    let attrs: Vec<_> = Feature::ALL.iter().map(|f| attr(*f, 1.0)).collect();
    assert_eq!(select_top(&attrs, TOP_FEATURES).len(), 5);
    assert_eq!(select_top(&attrs, 2).len(), 2);
  }

  #[test]
  fn horizon_strings() {
    assert_eq!(Horizon::OneYear.as_str(), "one_year");
    assert_eq!("three_year".parse::<Horizon>().unwrap(), Horizon::ThreeYear);
  }
}
