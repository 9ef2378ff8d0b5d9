//! Error types for the laurel-table codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("table has no header row")]
  MissingHeader,

  #[error("duplicate column {0:?} in header")]
  DuplicateColumn(String),

  #[error("line {line}: expected {expected} cells, found {found}")]
  RaggedRow { line: usize, expected: usize, found: usize },

  #[error("line {line}: unterminated quoted cell")]
  UnterminatedQuote { line: usize },

  #[error("line {line}: unexpected character after closing quote")]
  TrailingAfterQuote { line: usize },

  #[error("unknown column {0:?}")]
  UnknownColumn(String),

  #[error("row {row}, column {column:?}: cannot parse {value:?} as a number")]
  NotNumeric { row: usize, column: String, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
