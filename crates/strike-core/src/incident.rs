//! Incidents: kill reports that point at the system they happened in.

use serde::{Deserialize, Serialize};

use crate::{
  CatalogRecord, ColumnValue, RawRecord, RecordKind, ValidationError, record::decode_wire,
};

/// An incident as stored locally. Every text field defaults to `""` and the
/// timestamp to `0` when the remote record omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
  pub id:                i64,
  pub victim_address:    String,
  pub victim_name:       String,
  pub loss_type:         String,
  pub killer_address:    String,
  pub killer_name:       String,
  /// Epoch seconds.
  pub time_stamp:        i64,
  pub solar_system_id:   Option<i64>,
  /// The system name as observed when the incident was reported. Never
  /// refreshed from the systems table.
  pub solar_system_name: String,
}

#[derive(Deserialize)]
struct IncidentWire {
  id:                Option<i64>,
  victim_address:    Option<String>,
  victim_name:       Option<String>,
  loss_type:         Option<String>,
  killer_address:    Option<String>,
  killer_name:       Option<String>,
  time_stamp:        Option<i64>,
  solar_system_id:   Option<i64>,
  solar_system_name: Option<String>,
}

impl CatalogRecord for Incident {
  const KIND: RecordKind = RecordKind::Incidents;
  const COLUMNS: &'static [&'static str] = &[
    "victim_address",
    "victim_name",
    "loss_type",
    "killer_address",
    "killer_name",
    "time_stamp",
    "solar_system_id",
    "solar_system_name",
  ];

  fn id(&self) -> i64 { self.id }

  fn values(&self) -> Vec<ColumnValue> {
    vec![
      self.victim_address.clone().into(),
      self.victim_name.clone().into(),
      self.loss_type.clone().into(),
      self.killer_address.clone().into(),
      self.killer_name.clone().into(),
      self.time_stamp.into(),
      self.solar_system_id.into(),
      self.solar_system_name.clone().into(),
    ]
  }

  fn from_raw(raw: &RawRecord) -> Result<Self, ValidationError> {
    let wire: IncidentWire = decode_wire(raw)?;
    Ok(Self {
      id:                wire.id.ok_or(ValidationError::MissingField("id"))?,
      victim_address:    wire.victim_address.unwrap_or_default(),
      victim_name:       wire.victim_name.unwrap_or_default(),
      loss_type:         wire.loss_type.unwrap_or_default(),
      killer_address:    wire.killer_address.unwrap_or_default(),
      killer_name:       wire.killer_name.unwrap_or_default(),
      time_stamp:        wire.time_stamp.unwrap_or(0),
      solar_system_id:   wire.solar_system_id,
      solar_system_name: wire.solar_system_name.unwrap_or_default(),
    })
  }

  fn reference(&self) -> Option<(RecordKind, i64)> {
    self.solar_system_id.map(|id| (RecordKind::Systems, id))
  }
}
