//! Error type for `rondas-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] rondas_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value that no longer matches the domain model.
  #[error("corrupt row: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The SQLite error code carried by `err`, if any.
fn sqlite_code(err: &rusqlite::Error) -> Option<ErrorCode> {
  match err {
    rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
    _ => None,
  }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
  sqlite_code(err) == Some(ErrorCode::ConstraintViolation)
}

fn is_transient(err: &rusqlite::Error) -> bool {
  matches!(
    sqlite_code(err),
    Some(
      ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::SystemIoFailure
        | ErrorCode::CannotOpen
        | ErrorCode::DiskFull
    )
  )
}

fn fold_sqlite(err: rusqlite::Error) -> rondas_core::Error {
  if is_transient(&err) {
    rondas_core::Error::Unavailable(err.to_string())
  } else if is_constraint_violation(&err) {
    rondas_core::Error::Conflict(err.to_string())
  } else {
    rondas_core::Error::Internal(err.to_string())
  }
}

impl From<Error> for rondas_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::Sqlite(e) => fold_sqlite(e),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => fold_sqlite(e),
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => {
        Self::Unavailable("database connection closed".into())
      }
      Error::Database(e) => Self::Internal(e.to_string()),
      Error::Json(e) => Self::Serialization(e),
      Error::DateParse(msg) | Error::Decode(msg) => Self::Internal(msg),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn failure(code: std::os::raw::c_int) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
  }

  #[test]
  fn busy_database_is_unavailable() {
    let err: rondas_core::Error = Error::Sqlite(failure(rusqlite::ffi::SQLITE_BUSY)).into();
    assert!(matches!(err, rondas_core::Error::Unavailable(_)));

    let err: rondas_core::Error =
      Error::Database(tokio_rusqlite::Error::ConnectionClosed).into();
    assert!(matches!(err, rondas_core::Error::Unavailable(_)));
  }

  #[test]
  fn constraint_violation_is_conflict() {
    let err: rondas_core::Error =
      Error::Sqlite(failure(rusqlite::ffi::SQLITE_CONSTRAINT)).into();
    assert!(matches!(err, rondas_core::Error::Conflict(_)));
  }

  #[test]
  fn core_errors_pass_through() {
    let err: rondas_core::Error =
      Error::Core(rondas_core::Error::not_found("collector 7 not found")).into();
    assert!(matches!(err, rondas_core::Error::NotFound(ref m) if m.contains("7")));
  }
}
