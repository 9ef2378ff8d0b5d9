//! Per-feature attribution of a candidate's prediction.
//!
//! Both methods are linear and deterministic: they are a readable
//! approximation of feature influence, not Shapley values.

use laurel_core::{
  feature::{Feature, FeatureVector},
  prediction::Attribution,
};
use serde::{Deserialize, Serialize};

use crate::{Error, LogisticModel, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
  /// `weight · raw_value` with the fixed per-feature weights.
  #[default]
  FixedWeights,
  /// `coefficient · standardised_value` from the fitted logistic member.
  LogisticCoefficients,
}

/// One attribution per tracked feature, in [`Feature::ALL`] order.
pub fn fixed_weight_attributions(values: &FeatureVector) -> Vec<Attribution> {
  Feature::ALL
    .iter()
    .map(|f| {
      let value = values.get(*f);
      Attribution { feature: *f, value, contribution: f.attribution_weight() * value }
    })
    .collect()
}

/// One attribution per tracked feature from the logistic member's
/// coefficients. `standardised` is the candidate's row after scaling.
pub fn coefficient_attributions(
  model:        &LogisticModel,
  values:       &FeatureVector,
  standardised: &[f64],
) -> Result<Vec<Attribution>> {
  for len in [model.coefficients.len(), standardised.len()] {
    if len != Feature::ALL.len() {
      return Err(Error::DimensionMismatch { expected: Feature::ALL.len(), found: len });
    }
  }
  Ok(
    Feature::ALL
      .iter()
      .map(|f| {
        let i = f.index();
        Attribution {
          feature:      *f,
          value:        values.get(*f),
          contribution: model.coefficients[i] * standardised[i],
        }
      })
      .collect(),
  )
}
