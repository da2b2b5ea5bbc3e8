//! [`UpsertWriter`] validates raw remote records and hands the valid ones to
//! a [`CatalogStore`].
//!
//! Validation failures are per-record and never reach the store. Store
//! failures are returned as [`Error::Storage`] and end the current phase.

use std::collections::{HashMap, HashSet};

use strike_core::{
  CatalogRecord, RawRecord, RecordKind, ValidationError,
  record::raw_id,
  run::Rejection,
  store::CatalogStore,
};

use crate::{Error, Result};

/// Result of a bulk upsert.
#[derive(Debug, Default)]
pub struct BatchOutcome {
  /// Rows written in the batch transaction.
  pub written:  usize,
  /// Ids of the written records, in input order, first occurrence only.
  pub ids:      Vec<i64>,
  pub rejected: Vec<Rejection>,
}

/// Result of a single-record upsert that did not hit a storage error.
#[derive(Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
  Written,
  Rejected(Rejection),
}

fn reject(id: Option<i64>, err: &ValidationError) -> Rejection {
  Rejection { id, reason: err.to_string() }
}

fn storage<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Storage(Box::new(e))
}

/// Writes validated records through a [`CatalogStore`].
pub struct UpsertWriter<'a, S> {
  store:              &'a S,
  enforce_references: bool,
}

impl<'a, S: CatalogStore> UpsertWriter<'a, S> {
  /// With `enforce_references`, records whose [`CatalogRecord::reference`]
  /// points at a row that is not stored are rejected before writing.
  pub fn new(store: &'a S, enforce_references: bool) -> Self { Self { store, enforce_references } }

  pub fn store(&self) -> &'a S { self.store }

  /// Validate `raws` and upsert every valid record in one transaction.
  pub async fn upsert_batch<R: CatalogRecord>(&self, raws: &[RawRecord]) -> Result<BatchOutcome> {
    let mut rejected = Vec::new();
    let mut valid = Vec::with_capacity(raws.len());
    for raw in raws {
      match R::from_raw(raw) {
        Ok(record) => valid.push(record),
        Err(e) => rejected.push(reject(raw_id(raw), &e)),
      }
    }

    let valid = self.drop_dangling(valid, &mut rejected).await?;

    let mut seen = HashSet::with_capacity(valid.len());
    let ids = valid
      .iter()
      .map(CatalogRecord::id)
      .filter(|id| seen.insert(*id))
      .collect();

    let written = self.store.upsert_batch(valid).await.map_err(storage)?;

    for r in &rejected {
      tracing::warn!(kind = %R::KIND, id = ?r.id, reason = %r.reason, "record rejected");
    }
    Ok(BatchOutcome { written, ids, rejected })
  }

  /// Validate `raw` and upsert it in its own transaction.
  pub async fn upsert_one<R: CatalogRecord>(&self, raw: &RawRecord) -> Result<UpsertOutcome> {
    let record = match R::from_raw(raw) {
      Ok(record) => record,
      Err(e) => return Ok(UpsertOutcome::Rejected(reject(raw_id(raw), &e))),
    };

    let mut rejected = Vec::new();
    let Some(record) = self.drop_dangling(vec![record], &mut rejected).await?.pop() else {
      return Ok(match rejected.pop() {
        Some(r) => UpsertOutcome::Rejected(r),
        None => UpsertOutcome::Written,
      });
    };

    self.store.upsert_one(record).await.map_err(storage)?;
    Ok(UpsertOutcome::Written)
  }

  /// Split off records whose reference target is missing from the store.
  async fn drop_dangling<R: CatalogRecord>(
    &self,
    records: Vec<R>,
    rejected: &mut Vec<Rejection>,
  ) -> Result<Vec<R>> {
    if !self.enforce_references {
      return Ok(records);
    }

    let mut wanted: HashMap<RecordKind, HashSet<i64>> = HashMap::new();
    for (kind, id) in records.iter().filter_map(CatalogRecord::reference) {
      wanted.entry(kind).or_default().insert(id);
    }
    if wanted.is_empty() {
      return Ok(records);
    }

    let mut present: HashMap<RecordKind, HashSet<i64>> = HashMap::new();
    for (kind, ids) in wanted {
      let found = self
        .store
        .existing_ids(kind, ids.into_iter().collect())
        .await
        .map_err(storage)?;
      present.insert(kind, found);
    }

    Ok(
      records
        .into_iter()
        .filter(|record| match record.reference() {
          Some((kind, id)) if !present.get(&kind).is_some_and(|ids| ids.contains(&id)) => {
            let err = ValidationError::UnknownReference { kind, id };
            rejected.push(reject(Some(record.id()), &err));
            false
          }
          _ => true,
        })
        .collect(),
    )
  }
}
