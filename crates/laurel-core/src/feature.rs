//! Tracked features — the fixed numeric inputs of every model.
//!
//! The order of [`Feature::ALL`] is the column order of every feature matrix,
//! scaler and model artifact. Changing it invalidates persisted artifacts.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub const FEATURE_COUNT: usize = 5;

/// One of the engineered features tracked per candidate snapshot.
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
pub enum Feature {
  TotalCitations,
  #[serde(rename = "h_index")]
  #[strum(serialize = "h_index")]
  HIndex,
  RecentTrend,
  SeminalScore,
  AwardCount,
}

impl Feature {
  pub const ALL: [Feature; FEATURE_COUNT] = [
    Feature::TotalCitations,
    Feature::HIndex,
    Feature::RecentTrend,
    Feature::SeminalScore,
    Feature::AwardCount,
  ];

  /// Column name used in feature tables and attribution payloads.
  pub fn name(self) -> &'static str { self.into() }

  /// Magnitude-only features must never be negative.
  pub fn is_magnitude(self) -> bool {
    matches!(self, Self::TotalCitations | Self::HIndex | Self::AwardCount)
  }

  /// Hand-specified per-feature weight used by the fixed-weight attribution.
  /// Not derived from any trained model.
  pub fn attribution_weight(self) -> f64 {
    match self {
      Self::TotalCitations => 1e-5,
      Self::HIndex => 0.002,
      Self::RecentTrend => 0.2,
      Self::SeminalScore => 0.15,
      Self::AwardCount => 0.05,
    }
  }

  /// Position of this feature in [`Feature::ALL`].
  pub fn index(self) -> usize {
    match self {
      Self::TotalCitations => 0,
      Self::HIndex => 1,
      Self::RecentTrend => 2,
      Self::SeminalScore => 3,
      Self::AwardCount => 4,
    }
  }
}

/// The five numeric features of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
  pub total_citations: i64,
  pub h_index:         f64,
  pub recent_trend:    f64,
  pub seminal_score:   f64,
  pub award_count:     i64,
}

impl FeatureVector {
  pub fn get(&self, feature: Feature) -> f64 {
    match feature {
      Feature::TotalCitations => self.total_citations as f64,
      Feature::HIndex => self.h_index,
      Feature::RecentTrend => self.recent_trend,
      Feature::SeminalScore => self.seminal_score,
      Feature::AwardCount => self.award_count as f64,
    }
  }

  /// Values in [`Feature::ALL`] order.
  pub fn to_array(&self) -> [f64; FEATURE_COUNT] { Feature::ALL.map(|f| self.get(f)) }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn names_round_trip_through_from_str() {
    for feature in Feature::ALL {
      assert_eq!(Feature::from_str(feature.name()).unwrap(), feature);
    }
    assert_eq!(Feature::HIndex.name(), "h_index");
    assert_eq!(Feature::TotalCitations.name(), "total_citations");
  }

  #[test]
  fn index_matches_all_order() {
    for (i, feature) in Feature::ALL.iter().enumerate() {
      assert_eq!(feature.index(), i);
    }
  }

  #[test]
  fn serde_uses_column_names() {
    let json = serde_json::to_string(&Feature::HIndex).unwrap();
    assert_eq!(json, "\"h_index\"");
    let back: Feature = serde_json::from_str("\"seminal_score\"").unwrap();
    assert_eq!(back, Feature::SeminalScore);
  }

  #[test]
  fn vector_array_follows_feature_order() {
    let v = FeatureVector {
      total_citations: 12_000,
      h_index:         65.0,
      recent_trend:    0.8,
      seminal_score:   0.9,
      award_count:     4,
    };
    assert_eq!(v.to_array(), [12_000.0, 65.0, 0.8, 0.9, 4.0]);
  }
}
