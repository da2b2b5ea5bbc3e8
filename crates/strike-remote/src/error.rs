//! Transport error type for `strike-remote`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("GET {url} → {status}")]
  Status { url: String, status: reqwest::StatusCode },

  #[error("unexpected response body from {url}: {reason}")]
  Body { url: String, reason: String },

  #[error("invalid remote configuration: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
