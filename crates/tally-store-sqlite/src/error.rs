//! Error type for `tally-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl Error {
  /// The core error, if this wraps one.
  pub fn core(&self) -> Option<&tally_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }

  pub fn is_retryable(&self) -> bool { self.core().is_some_and(tally_core::Error::is_retryable) }
}

/// Busy and locked databases mean another writer holds the lock; nothing of
/// ours was applied.
fn is_contention(e: &rusqlite::Error) -> bool {
  matches!(
    e.sqlite_error_code(),
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  )
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    if is_contention(&e) {
      Self::Core(tally_core::Error::ConcurrentUpdateConflict)
    } else {
      Self::Sqlite(e)
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(e) => e.into(),
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
