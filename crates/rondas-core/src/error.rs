//! Error types for `rondas-core`.
//!
//! Every backend error is eventually folded into [`Error`] so the HTTP layer
//! can map it onto a status code without knowing which store produced it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Bad or missing payload, or a strict tag label that does not resolve.
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  /// A write lost a uniqueness race and the retry did not settle it.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The storage layer could not be reached or is temporarily busy.
  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
