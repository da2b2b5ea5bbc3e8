//! Encoding and decoding helpers between Rust domain types and the values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so they sort
//! lexically. UUIDs are stored as hyphenated lowercase strings. Counters are
//! stored as INTEGER.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use strike_core::{
  ColumnValue, Coordinates, Incident, SolarSystem,
  run::{RunCounts, RunRecord},
  store::SystemActivity,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Column values ───────────────────────────────────────────────────────────

pub fn to_sql_value(v: ColumnValue) -> Value {
  match v {
    ColumnValue::Null => Value::Null,
    ColumnValue::Integer(i) => Value::Integer(i),
    ColumnValue::Real(f) => Value::Real(f),
    ColumnValue::Text(s) => Value::Text(s),
  }
}

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ────────────────────────────────────────────────────────────────

pub fn encode_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn decode_count(n: i64) -> usize { usize::try_from(n).unwrap_or(0) }

fn coordinates(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Option<Coordinates> {
  Some(Coordinates { x: x?, y: y?, z: z? })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns read directly from a `systems` row.
pub struct RawSystem {
  pub id:        i64,
  pub name:      String,
  pub region_id: Option<i64>,
  pub x:         Option<f64>,
  pub y:         Option<f64>,
  pub z:         Option<f64>,
}

impl RawSystem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      name:      row.get(1)?,
      region_id: row.get(2)?,
      x:         row.get(3)?,
      y:         row.get(4)?,
      z:         row.get(5)?,
    })
  }

  pub fn into_system(self) -> SolarSystem {
    SolarSystem {
      id:          self.id,
      name:        self.name,
      region_id:   self.region_id,
      coordinates: coordinates(self.x, self.y, self.z),
    }
  }
}

/// Read an `incident` row straight into the domain type; every column maps
/// one-to-one.
pub fn incident_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Incident> {
  Ok(Incident {
    id:                row.get(0)?,
    victim_address:    row.get(1)?,
    victim_name:       row.get(2)?,
    loss_type:         row.get(3)?,
    killer_address:    row.get(4)?,
    killer_name:       row.get(5)?,
    time_stamp:        row.get(6)?,
    solar_system_id:   row.get(7)?,
    solar_system_name: row.get(8)?,
  })
}

/// A `systems` row joined with its incident count.
pub struct RawActivity {
  pub system:         RawSystem,
  pub incident_count: i64,
}

impl RawActivity {
  pub fn into_activity(self) -> SystemActivity {
    let system = self.system.into_system();
    SystemActivity {
      solar_system_id:   system.id,
      solar_system_name: system.name,
      region_id:         system.region_id,
      coordinates:       system.coordinates,
      incident_count:    u64::try_from(self.incident_count).unwrap_or(0),
    }
  }
}

/// Raw values read directly from a run-log row.
pub struct RawRun {
  pub run_id:         String,
  pub collection:     String,
  pub status:         String,
  pub started_at:     String,
  pub finished_at:    String,
  pub fetched:        i64,
  pub pages:          i64,
  pub fetch_complete: bool,
  pub bulk_written:   i64,
  pub enriched:       i64,
  pub missed:         i64,
  pub rejected:       i64,
}

impl RawRun {
  pub fn into_record(self) -> Result<RunRecord> {
    Ok(RunRecord {
      run_id:      decode_uuid(&self.run_id)?,
      collection:  self.collection.parse()?,
      status:      self.status.parse()?,
      started_at:  decode_dt(&self.started_at)?,
      finished_at: decode_dt(&self.finished_at)?,
      counts:      RunCounts {
        fetched:        decode_count(self.fetched),
        pages:          decode_count(self.pages),
        fetch_complete: self.fetch_complete,
        bulk_written:   decode_count(self.bulk_written),
        enriched:       decode_count(self.enriched),
        missed:         decode_count(self.missed),
        rejected:       decode_count(self.rejected),
      },
    })
  }
}
