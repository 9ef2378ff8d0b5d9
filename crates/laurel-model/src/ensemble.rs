//! The three-member ensemble and its persisted form.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Matrix, Result,
  boost::{BoostParams, BoostedModel},
  logistic::{LogisticModel, LogisticParams},
};

// ─── Classifier ──────────────────────────────────────────────────────────────

/// A fitted binary classifier.
pub trait Classifier {
  /// Probability of the positive class for one (already standardised) row.
  fn predict_row(&self, row: &[f64]) -> f64;

  fn predict(&self, x: &Matrix) -> Vec<f64> { x.rows().map(|r| self.predict_row(r)).collect() }
}

// ─── Members ─────────────────────────────────────────────────────────────────

/// Which ensemble member a model is. Also names its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
  Logistic,
  BoostedShallow,
  BoostedWide,
}

impl ModelKind {
  pub const ALL: [ModelKind; 3] = [ModelKind::Logistic, ModelKind::BoostedShallow, ModelKind::BoostedWide];

  pub fn artifact_name(self) -> &'static str {
    match self {
      Self::Logistic => "logistic",
      Self::BoostedShallow => "boosted_shallow",
      Self::BoostedWide => "boosted_wide",
    }
  }
}

/// A fitted model as written to and read from an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
  Logistic(LogisticModel),
  Boosted(BoostedModel),
}

impl FittedModel {
  pub fn as_logistic(&self) -> Option<&LogisticModel> {
    match self {
      Self::Logistic(m) => Some(m),
      Self::Boosted(_) => None,
    }
  }

  /// Whether this model can stand in as member `kind`.
  pub fn is_kind(&self, kind: ModelKind) -> bool {
    match self {
      Self::Logistic(_) => kind == ModelKind::Logistic,
      Self::Boosted(_) => matches!(kind, ModelKind::BoostedShallow | ModelKind::BoostedWide),
    }
  }

  /// Reject a model whose shape does not fit `n_features` inputs.
  pub fn validate(&self, n_features: usize) -> Result<()> {
    match self {
      Self::Logistic(m) if m.coefficients.len() != n_features => {
        Err(crate::Error::DimensionMismatch { expected: n_features, found: m.coefficients.len() })
      }
      Self::Logistic(_) => Ok(()),
      Self::Boosted(m) => m.validate(n_features),
    }
  }
}

impl Classifier for FittedModel {
  fn predict_row(&self, row: &[f64]) -> f64 {
    match self {
      Self::Logistic(m) => m.predict_row(row),
      Self::Boosted(m) => m.predict_row(row),
    }
  }
}

// ─── Ensemble ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleConfig {
  pub logistic:        LogisticParams,
  pub boosted_shallow: BoostParams,
  pub boosted_wide:    BoostParams,
  /// Seed for the boosted members' row and column sampling.
  pub seed:            u64,
}

impl Default for EnsembleConfig {
  fn default() -> Self {
    Self {
      logistic:        LogisticParams::default(),
      boosted_shallow: BoostParams::shallow(),
      boosted_wide:    BoostParams::wide(),
      seed:            42,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
  pub kind:  ModelKind,
  pub model: FittedModel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
  pub members: Vec<Member>,
}

/// Per-member and averaged probabilities for a batch of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutput {
  pub members: Vec<(ModelKind, Vec<f64>)>,
  pub mean:    Vec<f64>,
}

impl EnsembleOutput {
  /// The member probabilities for one row, in member order.
  pub fn row_members(&self, i: usize) -> Vec<f64> {
    self.members.iter().map(|(_, p)| p[i]).collect()
  }
}

/// Fit all three members on the same standardised training rows. Members are
/// independent and train in parallel on the rayon pool.
pub fn fit_ensemble(x: &Matrix, y: &[f64], config: &EnsembleConfig) -> Result<Ensemble> {
  let (logistic, (shallow, wide)) = rayon::join(
    || LogisticModel::fit(x, y, &config.logistic),
    || {
      rayon::join(
        || BoostedModel::fit(x, y, &config.boosted_shallow, config.seed),
        || BoostedModel::fit(x, y, &config.boosted_wide, config.seed),
      )
    },
  );

  let ensemble = Ensemble {
    members: vec![
      Member { kind: ModelKind::Logistic, model: FittedModel::Logistic(logistic?) },
      Member { kind: ModelKind::BoostedShallow, model: FittedModel::Boosted(shallow?) },
      Member { kind: ModelKind::BoostedWide, model: FittedModel::Boosted(wide?) },
    ],
  };
  debug!(rows = x.n_rows(), "fitted ensemble");
  Ok(ensemble)
}

/// Arithmetic mean of member probabilities; `0.0` for no members.
pub fn mean_probability(probabilities: &[f64]) -> f64 {
  if probabilities.is_empty() {
    return 0.0;
  }
  probabilities.iter().sum::<f64>() / probabilities.len() as f64
}

impl Ensemble {
  pub fn predict(&self, x: &Matrix) -> EnsembleOutput {
    let members: Vec<(ModelKind, Vec<f64>)> =
      self.members.iter().map(|m| (m.kind, m.model.predict(x))).collect();
    let mean = (0..x.n_rows())
      .map(|i| {
        let row: Vec<f64> = members.iter().map(|(_, p)| p[i]).collect();
        mean_probability(&row).clamp(0.0, 1.0)
      })
      .collect();
    EnsembleOutput { members, mean }
  }

  pub fn member(&self, kind: ModelKind) -> Option<&FittedModel> {
    self.members.iter().find(|m| m.kind == kind).map(|m| &m.model)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_of_three_members() {
    let p = [0.2, 0.5, 0.8];
    assert!((mean_probability(&p) - (0.2 + 0.5 + 0.8) / 3.0).abs() < 1e-15);
    assert_eq!(mean_probability(&[]), 0.0);
  }

  #[test]
  fn fits_three_named_members() {
    let rows: Vec<[f64; 2]> = (0..12).map(|i| [i as f64, (i % 3) as f64]).collect();
    let x = Matrix::from_rows(&rows).unwrap();
    let y: Vec<f64> = (0..12).map(|i| if i > 7 { 1.0 } else { 0.0 }).collect();

    let ensemble = fit_ensemble(&x, &y, &EnsembleConfig::default()).unwrap();
    let kinds: Vec<_> = ensemble.members.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, ModelKind::ALL);

    let out = ensemble.predict(&x);
    assert_eq!(out.mean.len(), 12);
    for i in 0..12 {
      let expected = mean_probability(&out.row_members(i));
      assert!((out.mean[i] - expected).abs() < 1e-15);
      assert!((0.0..=1.0).contains(&out.mean[i]));
    }
  }

  #[test]
  fn fitted_model_round_trips_through_json() {
    let x = Matrix::from_rows(&[[0.0], [1.0], [2.0], [3.0]]).unwrap();
    let y = [0.0, 0.0, 1.0, 1.0];
    let model = FittedModel::Boosted(BoostedModel::fit(&x, &y, &BoostParams::shallow(), 3).unwrap());

    let json = serde_json::to_string(&model).unwrap();
    assert!(json.contains("\"kind\":\"boosted\""));
    let back: FittedModel = serde_json::from_str(&json).unwrap();
    assert_eq!(back.predict(&x), model.predict(&x));
  }

  #[test]
  fn validate_checks_width() {
    let model = FittedModel::Logistic(LogisticModel { coefficients: vec![0.0; 5], intercept: 0.0, n_iter: 1 });
    assert!(model.validate(5).is_ok());
    assert!(model.validate(4).is_err());
    assert!(model.is_kind(ModelKind::Logistic));
    assert!(!model.is_kind(ModelKind::BoostedWide));
  }

  #[test]
  fn artifact_names() {
    let names: Vec<_> = ModelKind::ALL.iter().map(|k| k.artifact_name()).collect();
    assert_eq!(names, ["logistic", "boosted_shallow", "boosted_wide"]);
  }
}
