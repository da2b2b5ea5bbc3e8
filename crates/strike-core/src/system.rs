//! Solar systems, the primary synchronized entity.

use serde::{Deserialize, Serialize};

use crate::{
  CatalogRecord, ColumnValue, RawRecord, RecordKind, ValidationError, record::decode_wire,
};

/// Position of a system in the galaxy. Magnitudes are large; the core only
/// carries them through to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

/// A solar system as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarSystem {
  pub id:          i64,
  /// Compared case-insensitively by the store.
  pub name:        String,
  /// `None` when the remote record did not say; distinct from region 0.
  pub region_id:   Option<i64>,
  pub coordinates: Option<Coordinates>,
}

/// Shape of a system on the wire. Covers both the paginated world API
/// (`id`, `name`, `regionId`, `location`) and the flat location feed
/// (`solar_system_id`, `solar_system_name`, `coordinates`).
#[derive(Deserialize)]
struct SystemWire {
  #[serde(alias = "solar_system_id")]
  id:        Option<i64>,
  #[serde(alias = "solar_system_name")]
  name:      Option<String>,
  #[serde(rename = "regionId", alias = "region_id")]
  region_id: Option<i64>,
  #[serde(alias = "coordinates")]
  location:  Option<Coordinates>,
}

impl CatalogRecord for SolarSystem {
  const KIND: RecordKind = RecordKind::Systems;
  const COLUMNS: &'static [&'static str] = &["solar_system_name", "region_id", "x", "y", "z"];

  fn id(&self) -> i64 { self.id }

  fn values(&self) -> Vec<ColumnValue> {
    let c = self.coordinates;
    vec![
      self.name.clone().into(),
      self.region_id.into(),
      c.map(|c| c.x).into(),
      c.map(|c| c.y).into(),
      c.map(|c| c.z).into(),
    ]
  }

  fn from_raw(raw: &RawRecord) -> Result<Self, ValidationError> {
    let wire: SystemWire = decode_wire(raw)?;
    Ok(Self {
      id:          wire.id.ok_or(ValidationError::MissingField("id"))?,
      name:        wire.name.ok_or(ValidationError::MissingField("name"))?,
      region_id:   wire.region_id,
      coordinates: wire.location,
    })
  }
}
