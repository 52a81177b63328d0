//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as `{"error": "<message>"}` with the status
//! code of its category.

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
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  /// Bad credentials, an invalid token, or a wrong API key.
  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  Unavailable(String),

  #[error("{0}")]
  Internal(String),
}

impl ApiError {
  /// Convert a store error through the domain taxonomy.
  pub fn store<E: Into<rondas_core::Error>>(err: E) -> Self { Self::from(err.into()) }

  pub fn unauthorized(msg: impl Into<String>) -> Self { Self::Unauthorized(msg.into()) }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<rondas_core::Error> for ApiError {
  fn from(err: rondas_core::Error) -> Self {
    use rondas_core::Error as E;
    match err {
      E::Validation(m) => Self::Validation(m),
      E::NotFound(m) => Self::NotFound(m),
      E::Conflict(m) => Self::Conflict(m),
      E::Unavailable(m) => Self::Unavailable(m),
      E::Internal(m) => Self::Internal(m),
      E::Serialization(e) => Self::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(%status, error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
