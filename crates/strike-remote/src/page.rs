//! Response envelopes.

use serde::Deserialize;
use strike_core::RawRecord;

/// A collection response: either `{ "data": [...] }` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum CollectionBody {
  Envelope { data: Vec<RawRecord> },
  Bare(Vec<RawRecord>),
}

impl CollectionBody {
  pub fn into_records(self) -> Vec<RawRecord> {
    match self {
      Self::Envelope { data } => data,
      Self::Bare(records) => records,
    }
  }
}
