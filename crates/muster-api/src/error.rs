//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The store rejected a write or could not be reached.
  #[error("store unavailable: {0}")]
  Unavailable(String),

  /// The summarization service failed.
  #[error("summarization failed: {0}")]
  Upstream(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<muster_core::Error> for ApiError {
  fn from(e: muster_core::Error) -> Self {
    use muster_core::Error as E;
    match e {
      E::InvalidRecord(m) => Self::BadRequest(m),
      E::NotFound(id) => Self::NotFound(format!("incident {id}")),
      E::Summarization(m) => Self::Upstream(m),
      e @ (E::Write(_) | E::Connection(_) | E::Snapshot(_)) => Self::Unavailable(e.to_string()),
      E::Serialization(e) => Self::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::warn!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"muster\""),
      );
    }
    res
  }
}
