//! Error type for `strike-sync`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The store failed. Not recoverable within a run.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("core error: {0}")]
  Core(#[from] strike_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
