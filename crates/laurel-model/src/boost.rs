//! Gradient-boosted trees for binary log loss.

use rand::{SeedableRng, seq::index};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Matrix, Result,
  ensemble::Classifier,
  logistic::{logit, sigmoid},
  matrix::check_labels,
  tree::{RegressionTree, TreeParams},
};

/// The base rate used for the initial margin is kept this far from 0 and 1.
const BASE_RATE_CLAMP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
  pub n_rounds:      usize,
  pub learning_rate: f64,
  /// Fraction of rows sampled (without replacement) for each tree.
  pub subsample:     f64,
  /// Fraction of columns offered to each tree.
  pub colsample:     f64,
  pub tree:          TreeParams,
}

impl BoostParams {
  /// 50 depth-3 trees on 80% of rows and columns, L2 leaf penalty 1.
  pub fn shallow() -> Self {
    Self {
      n_rounds:      50,
      learning_rate: 0.1,
      subsample:     0.8,
      colsample:     0.8,
      tree:          TreeParams {
        max_depth:        3,
        min_samples_leaf: 1,
        min_child_weight: 1.0,
        lambda:           1.0,
      },
    }
  }

  /// 50 depth-6 trees on all rows and columns, at least 20 rows per leaf.
  pub fn wide() -> Self {
    Self {
      n_rounds:      50,
      learning_rate: 0.1,
      subsample:     1.0,
      colsample:     1.0,
      tree:          TreeParams {
        max_depth:        6,
        min_samples_leaf: 20,
        min_child_weight: 1e-3,
        lambda:           0.0,
      },
    }
  }

  fn validate(&self) -> Result<()> {
    let invalid = |name, reason: &str| {
      Err(Error::InvalidParameter { name, reason: reason.to_owned() })
    };
    if self.n_rounds == 0 {
      return invalid("n_rounds", "must be at least 1");
    }
    if !(self.learning_rate > 0.0) {
      return invalid("learning_rate", "must be positive");
    }
    if !(self.subsample > 0.0 && self.subsample <= 1.0) {
      return invalid("subsample", "must be in (0, 1]");
    }
    if !(self.colsample > 0.0 && self.colsample <= 1.0) {
      return invalid("colsample", "must be in (0, 1]");
    }
    Ok(())
  }
}

/// Size of a fractional sample of `n` items: rounded, at least one.
fn sample_size(n: usize, fraction: f64) -> usize {
  ((n as f64 * fraction).round() as usize).clamp(1, n)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
  /// Log-odds of the training base rate; the margin before any tree.
  pub base_margin:   f64,
  pub learning_rate: f64,
  pub trees:         Vec<RegressionTree>,
}

impl BoostedModel {
  /// Fit with Newton boosting on the logistic loss. `seed` drives row and
  /// column sampling, so equal inputs give equal models.
  pub fn fit(x: &Matrix, y: &[f64], params: &BoostParams, seed: u64) -> Result<Self> {
    params.validate()?;
    check_labels(x, y)?;

    let n = x.n_rows();
    let m = x.n_cols();
    let base_rate = (y.iter().sum::<f64>() / n as f64).clamp(BASE_RATE_CLAMP, 1.0 - BASE_RATE_CLAMP);
    let base_margin = logit(base_rate);

    let mut rng = Pcg64::seed_from_u64(seed);
    let mut margins = vec![base_margin; n];
    let mut grad = vec![0.0; n];
    let mut hess = vec![0.0; n];
    let mut trees = Vec::with_capacity(params.n_rounds);

    for _ in 0..params.n_rounds {
      for i in 0..n {
        let p = sigmoid(margins[i]);
        grad[i] = p - y[i];
        hess[i] = (p * (1.0 - p)).max(1e-16);
      }

      let mut rows: Vec<usize> = if params.subsample < 1.0 {
        index::sample(&mut rng, n, sample_size(n, params.subsample)).into_vec()
      } else {
        (0..n).collect()
      };
      let columns: Vec<usize> = if params.colsample < 1.0 {
        let mut cols = index::sample(&mut rng, m, sample_size(m, params.colsample)).into_vec();
        cols.sort_unstable();
        cols
      } else {
        (0..m).collect()
      };

      let tree = RegressionTree::fit(x, &grad, &hess, &mut rows, &columns, &params.tree);
      for (i, row) in x.rows().enumerate() {
        margins[i] += params.learning_rate * tree.predict(row);
      }
      trees.push(tree);
    }

    debug!(
      rounds = trees.len(),
      leaves = trees.iter().map(RegressionTree::n_leaves).sum::<usize>(),
      "fitted boosted model"
    );
    Ok(Self { base_margin, learning_rate: params.learning_rate, trees })
  }

  pub fn margin(&self, row: &[f64]) -> f64 {
    self.base_margin + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
  }

  pub fn validate(&self, n_features: usize) -> Result<()> {
    self.trees.iter().try_for_each(|t| t.validate(n_features))
  }
}

impl Classifier for BoostedModel {
  fn predict_row(&self, row: &[f64]) -> f64 { sigmoid(self.margin(row)) }
}
