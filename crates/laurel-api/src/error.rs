//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use laurel_pipeline::PipelineFailure;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A prerequisite (seed files, staged tables, model artifacts) is absent.
  #[error("not ready: {0}")]
  NotReady(String),

  #[error("data quality: {0}")]
  DataQuality(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  fn classify(error: &laurel_pipeline::Error, message: String) -> Self {
    if error.is_bad_input() {
      Self::BadRequest(message)
    } else if error.is_not_ready() {
      Self::NotReady(message)
    } else if error.is_data_quality() {
      Self::DataQuality(message)
    } else {
      Self::Internal(message)
    }
  }
}

impl From<laurel_pipeline::Error> for ApiError {
  fn from(error: laurel_pipeline::Error) -> Self {
    let message = error.to_string();
    Self::classify(&error, message)
  }
}

impl From<PipelineFailure> for ApiError {
  fn from(failure: PipelineFailure) -> Self {
    let message = failure.to_string();
    Self::classify(&failure.error, message)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::NotReady(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::DataQuality(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };
    if status.is_server_error() {
      tracing::error!(%status, error = %message, "request failed");
    }
    (status, Json(json!({ "error": message }))).into_response()
  }
}
