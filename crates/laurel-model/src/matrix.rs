//! Dense row-major feature matrix.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A non-empty, rectangular matrix of finite values, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
  n_cols: usize,
  data:   Vec<f64>,
}

impl Matrix {
  /// Build from rows of equal width. Rejects empty input, ragged rows and
  /// NaN/inf cells.
  pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
    let first = rows.first().ok_or(Error::EmptyDataset)?;
    let n_cols = first.as_ref().len();
    if n_cols == 0 {
      return Err(Error::DimensionMismatch { expected: 1, found: 0 });
    }

    let mut data = Vec::with_capacity(rows.len() * n_cols);
    for (r, row) in rows.iter().enumerate() {
      let row = row.as_ref();
      if row.len() != n_cols {
        return Err(Error::DimensionMismatch { expected: n_cols, found: row.len() });
      }
      if let Some(c) = row.iter().position(|v| !v.is_finite()) {
        return Err(Error::NonFinite { row: r, column: c });
      }
      data.extend_from_slice(row);
    }

    Ok(Self { n_cols, data })
  }

  pub fn n_rows(&self) -> usize { self.data.len() / self.n_cols }

  pub fn n_cols(&self) -> usize { self.n_cols }

  pub fn row(&self, i: usize) -> &[f64] { &self.data[i * self.n_cols..(i + 1) * self.n_cols] }

  pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
    self.data.chunks_exact(self.n_cols)
  }

  pub fn column(&self, j: usize) -> impl Iterator<Item = f64> + '_ {
    self.rows().map(move |r| r[j])
  }

  /// A new matrix holding the given rows, in the given order.
  pub fn select_rows(&self, indices: &[usize]) -> Matrix {
    let mut data = Vec::with_capacity(indices.len() * self.n_cols);
    for &i in indices {
      data.extend_from_slice(self.row(i));
    }
    Matrix { n_cols: self.n_cols, data }
  }

  /// Apply `f` to every row in place.
  pub(crate) fn map_rows(&mut self, mut f: impl FnMut(&mut [f64])) {
    for row in self.data.chunks_exact_mut(self.n_cols) {
      f(row);
    }
  }
}

/// Check that a label vector lines up with a matrix and is binary.
pub(crate) fn check_labels(x: &Matrix, y: &[f64]) -> Result<()> {
  if x.n_rows() != y.len() {
    return Err(Error::LabelMismatch { rows: x.n_rows(), labels: y.len() });
  }
  if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
    return Err(Error::InvalidParameter {
      name:   "labels",
      reason: format!("expected 0 or 1, found {bad}"),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_and_columns() {
    let m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
    assert_eq!(m.n_rows(), 3);
    assert_eq!(m.n_cols(), 2);
    assert_eq!(m.row(1), &[3.0, 4.0]);
    assert_eq!(m.column(1).collect::<Vec<_>>(), [2.0, 4.0, 6.0]);
    assert_eq!(m.select_rows(&[2, 0]).row(0), &[5.0, 6.0]);
  }

  #[test]
  fn rejects_bad_input() {
    let empty: [[f64; 2]; 0] = [];
    assert!(matches!(Matrix::from_rows(&empty), Err(Error::EmptyDataset)));
    let ragged = vec![vec![1.0, 2.0], vec![3.0]];
    assert!(matches!(
      Matrix::from_rows(&ragged),
      Err(Error::DimensionMismatch { expected: 2, found: 1 })
    ));
    assert!(matches!(
      Matrix::from_rows(&[[1.0, f64::NAN]]),
      Err(Error::NonFinite { row: 0, column: 1 })
    ));
  }

  #[test]
  fn labels_must_align_and_be_binary() {
    let m = Matrix::from_rows(&[[1.0], [2.0]]).unwrap();
    assert!(check_labels(&m, &[0.0, 1.0]).is_ok());
    assert!(matches!(check_labels(&m, &[0.0]), Err(Error::LabelMismatch { .. })));
    assert!(check_labels(&m, &[0.0, 0.5]).is_err());
  }
}
