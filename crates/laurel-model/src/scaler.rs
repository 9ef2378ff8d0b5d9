//! Per-column standardisation.

use serde::{Deserialize, Serialize};

use crate::{Error, Matrix, Result};

/// Mean / population standard deviation per column. A column with zero
/// spread gets a scale of 1 so it standardises to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
  pub mean:  Vec<f64>,
  pub scale: Vec<f64>,
}

impl StandardScaler {
  pub fn fit(x: &Matrix) -> Self {
    let n = x.n_rows() as f64;
    let (mean, scale): (Vec<f64>, Vec<f64>) = (0..x.n_cols())
      .map(|j| {
        let mean = x.column(j).sum::<f64>() / n;
        let var = x.column(j).map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        (mean, if std > 0.0 { std } else { 1.0 })
      })
      .unzip();
    Self { mean, scale }
  }

  pub fn n_features(&self) -> usize { self.mean.len() }

  pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
    if row.len() != self.n_features() {
      return Err(Error::DimensionMismatch { expected: self.n_features(), found: row.len() });
    }
    Ok(
      row
        .iter()
        .zip(self.mean.iter().zip(&self.scale))
        .map(|(v, (m, s))| (v - m) / s)
        .collect(),
    )
  }

  pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
    if x.n_cols() != self.n_features() {
      return Err(Error::DimensionMismatch { expected: self.n_features(), found: x.n_cols() });
    }
    let mut out = x.clone();
    out.map_rows(|row| {
      for (j, v) in row.iter_mut().enumerate() {
        *v = (*v - self.mean[j]) / self.scale[j];
      }
    });
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn standardises_to_zero_mean_unit_variance() {
    let x = Matrix::from_rows(&[[1.0, 10.0], [3.0, 10.0]]).unwrap();
    let scaler = StandardScaler::fit(&x);
    assert_eq!(scaler.mean, [2.0, 10.0]);
    assert_eq!(scaler.scale, [1.0, 1.0]);

    let z = scaler.transform(&x).unwrap();
    assert_eq!(z.row(0), &[-1.0, 0.0]);
    assert_eq!(z.row(1), &[1.0, 0.0]);
  }

  #[test]
  fn population_std_is_used() {
    let x = Matrix::from_rows(&[[0.0], [0.0], [6.0]]).unwrap();
    let scaler = StandardScaler::fit(&x);
    // Population variance of {0, 0, 6} is 8.
    assert!((scaler.scale[0] - 8f64.sqrt()).abs() < 1e-12);
  }

  #[test]
  fn width_is_checked() {
    let scaler = StandardScaler::fit(&Matrix::from_rows(&[[1.0, 2.0]]).unwrap());
    assert!(scaler.transform_row(&[1.0]).is_err());
  }
}
