//! Elastic-net penalised logistic regression.
//!
//! Minimises `mean(log_loss) + α·(ρ·‖w‖₁ + (1-ρ)/2·‖w‖²)` with
//! `α = 1 / (C·n)` by proximal gradient descent: a gradient step on the
//! smooth part followed by soft-thresholding for the L1 term. The intercept
//! is not penalised.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Matrix, Result,
  ensemble::Classifier,
  matrix::check_labels,
};

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
  if z >= 0.0 {
    1.0 / (1.0 + (-z).exp())
  } else {
    let e = z.exp();
    e / (1.0 + e)
  }
}

pub(crate) fn logit(p: f64) -> f64 { (p / (1.0 - p)).ln() }

fn soft_threshold(v: f64, t: f64) -> f64 {
  if v > t {
    v - t
  } else if v < -t {
    v + t
  } else {
    0.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
  /// Inverse regularisation strength.
  pub c:        f64,
  /// Share of the penalty that is L1; `1.0` is lasso, `0.0` is ridge.
  pub l1_ratio: f64,
  pub max_iter: usize,
  /// Stop once no parameter moves by more than this in one iteration.
  pub tol:      f64,
}

impl Default for LogisticParams {
  fn default() -> Self {
    Self { c: 1.0, l1_ratio: 0.5, max_iter: 1000, tol: 1e-4 }
  }
}

impl LogisticParams {
  fn validate(&self) -> Result<()> {
    if !(self.c > 0.0) {
      return Err(Error::InvalidParameter { name: "c", reason: format!("{} must be positive", self.c) });
    }
    if !(0.0..=1.0).contains(&self.l1_ratio) {
      return Err(Error::InvalidParameter {
        name:   "l1_ratio",
        reason: format!("{} is not in [0, 1]", self.l1_ratio),
      });
    }
    if self.max_iter == 0 {
      return Err(Error::InvalidParameter { name: "max_iter", reason: "must be at least 1".into() });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
  pub coefficients: Vec<f64>,
  pub intercept:    f64,
  /// Iterations run before convergence or the cap.
  pub n_iter:       usize,
}

impl LogisticModel {
  pub fn fit(x: &Matrix, y: &[f64], params: &LogisticParams) -> Result<Self> {
    params.validate()?;
    check_labels(x, y)?;

    let n = x.n_rows() as f64;
    let m = x.n_cols();
    let alpha = 1.0 / (params.c * n);
    let l1 = alpha * params.l1_ratio;
    let l2 = alpha * (1.0 - params.l1_ratio);

    // Lipschitz bound of the mean log loss over [1, x]; fixes the step size.
    let mean_sq_norm = x.rows().map(|r| r.iter().map(|v| v * v).sum::<f64>()).sum::<f64>() / n;
    let lipschitz = 0.25 * (1.0 + mean_sq_norm);
    let step_b = 1.0 / lipschitz;
    let step_w = 1.0 / (lipschitz + l2);

    let mut w = vec![0.0; m];
    let mut b = 0.0;
    let mut grad_w = vec![0.0; m];
    let mut n_iter = params.max_iter;

    for iter in 0..params.max_iter {
      grad_w.iter_mut().zip(&w).for_each(|(g, wj)| *g = l2 * wj);
      let mut grad_b = 0.0;
      for (row, yi) in x.rows().zip(y) {
        let z = b + row.iter().zip(&w).map(|(a, c)| a * c).sum::<f64>();
        let r = (sigmoid(z) - yi) / n;
        grad_b += r;
        for (g, v) in grad_w.iter_mut().zip(row) {
          *g += r * v;
        }
      }

      let mut delta: f64 = 0.0;
      for (wj, gj) in w.iter_mut().zip(&grad_w) {
        let next = soft_threshold(*wj - step_w * gj, step_w * l1);
        delta = delta.max((next - *wj).abs());
        *wj = next;
      }
      let next_b = b - step_b * grad_b;
      delta = delta.max((next_b - b).abs());
      b = next_b;

      if delta < params.tol {
        n_iter = iter + 1;
        break;
      }
    }

    debug!(n_iter, nonzero = w.iter().filter(|v| **v != 0.0).count(), "fitted logistic model");
    Ok(Self { coefficients: w, intercept: b, n_iter })
  }

  /// Linear score `intercept + w·row`.
  pub fn decision(&self, row: &[f64]) -> f64 {
    self.intercept + row.iter().zip(&self.coefficients).map(|(a, c)| a * c).sum::<f64>()
  }
}

impl Classifier for LogisticModel {
  fn predict_row(&self, row: &[f64]) -> f64 { sigmoid(self.decision(row)) }
}
