//! Error types for `laurel-model`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("dataset has no rows")]
  EmptyDataset,

  #[error("need at least {needed} rows, found {found}")]
  TooFewRows { needed: usize, found: usize },

  #[error("row has {found} values, expected {expected}")]
  DimensionMismatch { expected: usize, found: usize },

  #[error("{rows} rows but {labels} labels")]
  LabelMismatch { rows: usize, labels: usize },

  #[error("non-finite value at row {row}, column {column}")]
  NonFinite { row: usize, column: usize },

  #[error("invalid parameter {name}: {reason}")]
  InvalidParameter { name: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
