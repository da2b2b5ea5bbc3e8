//! Sync run outcomes: terminal status, counters, and the per-run report.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, RecordKind};

// ─── Status ──────────────────────────────────────────────────────────────────

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  /// Every entity was visited. Misses and rejections may still be non-zero.
  Done,
  /// The collection fetch returned nothing; no writes were performed.
  FailedEmpty,
  /// The store failed; the current phase stopped.
  AbortedStorage,
  /// Stopped by an external cancellation request.
  Cancelled,
}

impl RunStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Done => "done",
      Self::FailedEmpty => "failed_empty",
      Self::AbortedStorage => "aborted_storage",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn is_done(self) -> bool { matches!(self, Self::Done) }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RunStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "done" => Ok(Self::Done),
      "failed_empty" => Ok(Self::FailedEmpty),
      "aborted_storage" => Ok(Self::AbortedStorage),
      "cancelled" => Ok(Self::Cancelled),
      other => Err(Error::UnknownRunStatus(other.to_owned())),
    }
  }
}

// ─── Counters ────────────────────────────────────────────────────────────────

/// Progress counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
  /// Raw records returned by the collection fetch.
  pub fetched:        usize,
  /// Collection requests issued (including the terminating empty page).
  pub pages:          usize,
  /// `false` when pagination stopped on an error rather than an empty page.
  pub fetch_complete: bool,
  /// Rows written by the bulk phase.
  pub bulk_written:   usize,
  /// Rows overwritten with a detail record.
  pub enriched:       usize,
  /// Detail fetches that yielded nothing.
  pub missed:         usize,
  /// Raw records skipped by validation, across both phases.
  pub rejected:       usize,
}

/// A raw record that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
  pub id:     Option<i64>,
  pub reason: String,
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Everything a finished run has to say about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
  pub run_id:      Uuid,
  pub collection:  RecordKind,
  pub status:      RunStatus,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  #[serde(flatten)]
  pub counts:      RunCounts,
  pub missed_ids:  Vec<i64>,
  pub rejections:  Vec<Rejection>,
}

impl SyncReport {
  /// True only for a run that finished, fetched the whole collection, and
  /// neither missed nor rejected anything.
  pub fn is_clean(&self) -> bool {
    self.status.is_done()
      && self.counts.fetch_complete
      && self.counts.missed == 0
      && self.counts.rejected == 0
  }

  /// The persisted summary of this report.
  pub fn run_record(&self) -> RunRecord {
    RunRecord {
      run_id:      self.run_id,
      collection:  self.collection,
      status:      self.status,
      started_at:  self.started_at,
      finished_at: self.finished_at,
      counts:      self.counts.clone(),
    }
  }
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id:      Uuid,
  pub collection:  RecordKind,
  pub status:      RunStatus,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  #[serde(flatten)]
  pub counts:      RunCounts,
}
