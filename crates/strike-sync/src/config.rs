//! Sync configuration, deserialised from `strike.toml` and `STRIKE_*`
//! environment variables by the binary.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use strike_core::{RecordKind, store::TableNames};

use crate::{Error, Result};

/// Where and how to fetch one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
  /// Path under the API root, e.g. `solarsystems`.
  pub path:      String,
  /// Overrides [`SyncConfig::base_url`] for this collection.
  #[serde(default)]
  pub base_url:  Option<String>,
  /// Walk `?limit&offset` pages; otherwise fetch a single response.
  #[serde(default = "yes")]
  pub paginated: bool,
  /// Run the per-entity detail phase after the bulk load.
  #[serde(default)]
  pub detail:    bool,
}

fn yes() -> bool { true }

/// Everything a sync run needs to know, passed in explicitly.
///
/// Each collection section is deserialised as a whole, so a source that sets
/// only some of its keys must be layered over [`SyncConfig::default`], as
/// the binary does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub base_url:             String,
  pub store_path:           PathBuf,
  pub page_size:            usize,
  /// Minimum spacing between detail requests.
  pub detail_delay_ms:      u64,
  pub request_timeout_secs: u64,
  pub max_pages:            Option<usize>,
  /// Accept incidents that point at systems not stored yet.
  pub relax_incident_fk:    bool,
  pub tables:               TableNames,
  pub systems:              CollectionConfig,
  pub incidents:            CollectionConfig,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      base_url:             "https://world-api-stillness.live.tech.evefrontier.com/v2".into(),
      store_path:           PathBuf::from("strike.db"),
      page_size:            100,
      detail_delay_ms:      100,
      request_timeout_secs: 30,
      max_pages:            Some(10_000),
      relax_incident_fk:    false,
      tables:               TableNames::default(),
      systems:              CollectionConfig {
        path:      "solarsystems".into(),
        base_url:  None,
        paginated: true,
        detail:    true,
      },
      incidents:            CollectionConfig {
        path:      "incident".into(),
        base_url:  Some("https://api.alpha-strike.space".into()),
        paginated: false,
        detail:    false,
      },
    }
  }
}

impl SyncConfig {
  pub fn collection(&self, kind: RecordKind) -> &CollectionConfig {
    match kind {
      RecordKind::Systems => &self.systems,
      RecordKind::Incidents => &self.incidents,
    }
  }

  /// API root for `kind`, honouring the per-collection override.
  pub fn base_url_for(&self, kind: RecordKind) -> &str {
    self.collection(kind).base_url.as_deref().unwrap_or(&self.base_url)
  }

  pub fn detail_delay(&self) -> Duration { Duration::from_millis(self.detail_delay_ms) }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  pub fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(Error::Config("page_size must be at least 1".into()));
    }
    if self.request_timeout_secs == 0 {
      return Err(Error::Config("request_timeout_secs must be at least 1".into()));
    }
    if self.max_pages == Some(0) {
      return Err(Error::Config("max_pages must be at least 1 when set".into()));
    }
    self.tables.validate()?;
    Ok(())
  }
}
