//! Error types for `laurel-pipeline`.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::PipelineState;

#[derive(Debug, Error)]
pub enum Error {
  /// A seed batch or record broke its contract (mixed fields, empty batch,
  /// malformed seed JSON).
  #[error("validation error: {0}")]
  Validation(#[from] laurel_core::Error),

  #[error("table error: {0}")]
  Table(#[from] laurel_table::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("model error: {0}")]
  Model(#[from] laurel_model::Error),

  /// Two seed files would stage to the same feature table.
  #[error("seed files {first:?} and {second:?} both hold field {field:?}")]
  DuplicateField { field: String, first: PathBuf, second: PathBuf },

  /// A file an earlier stage should have produced is absent.
  #[error("missing {what} at {path:?}")]
  MissingDependency { what: &'static str, path: PathBuf },

  /// An artifact exists but does not match what training recorded.
  #[error("artifact {name} at {path:?} does not match its manifest: {reason}")]
  ArtifactMismatch { name: String, path: PathBuf, reason: String },

  #[error("data quality checks failed for field {field:?}: {failed:?}")]
  DataQuality { field: String, failed: Vec<String> },

  #[error("I/O error at {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("illegal state transition {from} -> {to}")]
  Transition { from: PipelineState, to: PipelineState },

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  /// Map an I/O error on `path`, turning "not found" into a missing
  /// dependency named `what`.
  pub(crate) fn io(what: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    let path = path.into();
    if source.kind() == std::io::ErrorKind::NotFound {
      Self::MissingDependency { what, path }
    } else {
      Self::Io { path, source }
    }
  }

  /// The caller sent something malformed; retrying the same input will fail
  /// the same way.
  pub fn is_bad_input(&self) -> bool {
    matches!(
      self,
      Self::Validation(_)
        | Self::Table(_)
        | Self::Json(_)
        | Self::Model(_)
        | Self::DuplicateField { .. }
    )
  }

  /// A prerequisite has not been produced yet (run ETL or training first).
  pub fn is_not_ready(&self) -> bool {
    matches!(self, Self::MissingDependency { .. } | Self::ArtifactMismatch { .. })
  }

  pub fn is_data_quality(&self) -> bool { matches!(self, Self::DataQuality { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error tagged with the pipeline stage it occurred in.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineFailure {
  pub stage: PipelineState,
  #[source]
  pub error: Error,
}
