//! The [`CatalogRecord`] trait, which every synchronized entity kind exposes
//! to storage backends, and the column value type used to hand rows over.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, ValidationError};

/// A record exactly as delivered by the remote API, before validation.
pub type RawRecord = serde_json::Value;

// ─── Record kinds ────────────────────────────────────────────────────────────

/// The collections the synchronizer knows how to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
  Systems,
  Incidents,
}

impl RecordKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Systems => "systems",
      Self::Incidents => "incidents",
    }
  }

  /// Name of the primary-key column in this kind's table.
  pub fn key_column(self) -> &'static str {
    match self {
      Self::Systems => "solar_system_id",
      Self::Incidents => "id",
    }
  }
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RecordKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "systems" => Ok(Self::Systems),
      "incidents" => Ok(Self::Incidents),
      other => Err(Error::UnknownCollection(other.to_owned())),
    }
  }
}

// ─── Column values ───────────────────────────────────────────────────────────

/// A single column value, independent of any database driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl From<i64> for ColumnValue {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<f64> for ColumnValue {
  fn from(v: f64) -> Self { Self::Real(v) }
}

impl From<String> for ColumnValue {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// An entity kind that can be validated from a raw remote record and upserted
/// into a table keyed by a stable integer identifier.
///
/// Upserts overwrite every column listed in [`CatalogRecord::COLUMNS`]; the
/// key column is never updated.
pub trait CatalogRecord: Sized + Send + Sync + 'static {
  const KIND: RecordKind;

  /// Non-key column names, in the order [`CatalogRecord::values`] yields them.
  const COLUMNS: &'static [&'static str];

  /// The stable identifier (primary key).
  fn id(&self) -> i64;

  /// Values for [`CatalogRecord::COLUMNS`], same order and length.
  fn values(&self) -> Vec<ColumnValue>;

  /// Validate a raw remote record, applying field defaults where the record
  /// kind has a safe one.
  fn from_raw(raw: &RawRecord) -> Result<Self, ValidationError>;

  /// Another record this one points at, if any. Backends that enforce
  /// references use it to reject dangling rows before writing.
  fn reference(&self) -> Option<(RecordKind, i64)> { None }
}

/// Best-effort identifier of a raw record, used to label rejections and to
/// drive the detail phase. Accepts both `id` and `solar_system_id`.
pub fn raw_id(raw: &RawRecord) -> Option<i64> {
  raw
    .get("id")
    .or_else(|| raw.get("solar_system_id"))
    .and_then(serde_json::Value::as_i64)
}

/// Deserialize `raw` into a wire shape, mapping serde failures to
/// [`ValidationError`].
pub(crate) fn decode_wire<T: DeserializeOwned>(raw: &RawRecord) -> Result<T, ValidationError> {
  if !raw.is_object() {
    return Err(ValidationError::NotAnObject);
  }
  serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))
}
