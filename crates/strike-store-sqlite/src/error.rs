//! Error type for `strike-store-sqlite`.

use strike_core::RecordKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] strike_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A record produced a different number of values than its kind declares
  /// columns.
  #[error("{kind} record {id} has {got} values for {expected} columns")]
  ColumnMismatch {
    kind:     RecordKind,
    id:       i64,
    expected: usize,
    got:      usize,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
