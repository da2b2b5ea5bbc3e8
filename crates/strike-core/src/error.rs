//! Error types for `strike-core`.

use thiserror::Error;

use crate::RecordKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid table name: {0:?}")]
  InvalidTableName(String),

  #[error("table name {0:?} is used more than once")]
  DuplicateTableName(String),

  #[error("unknown collection: {0:?}")]
  UnknownCollection(String),

  #[error("unknown run status: {0:?}")]
  UnknownRunStatus(String),
}

/// Why a raw remote record could not be turned into a storable row.
///
/// Validation errors are per-record: the offending record is skipped and the
/// rest of its batch proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("record is not a JSON object")]
  NotAnObject,

  #[error("missing required field `{0}`")]
  MissingField(&'static str),

  #[error("malformed record: {0}")]
  Malformed(String),

  #[error("references unknown {kind} record {id}")]
  UnknownReference { kind: RecordKind, id: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
