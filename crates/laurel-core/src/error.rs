//! Error types for `laurel-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("candidate not found: {0}")]
  CandidateNotFound(Uuid),

  #[error("seed batch is empty")]
  EmptyBatch,

  #[error("mixed fields in seed batch: expected {expected:?}, found {found:?}")]
  MixedFields { expected: String, found: String },

  #[error("unknown feature: {0:?}")]
  UnknownFeature(String),

  #[error("unknown horizon: {0:?}")]
  UnknownHorizon(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
