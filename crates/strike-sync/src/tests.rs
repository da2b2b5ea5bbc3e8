//! Orchestrator and writer tests against fake sources and an in-memory store.

use std::{
  collections::{HashMap, HashSet},
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

use serde_json::{Value, json};
use strike_core::{
  CatalogRecord, Incident, RawRecord, RecordKind, SolarSystem,
  run::{RunRecord, RunStatus},
  source::{CollectionSource, DetailSource, FetchedCollection},
  store::{CatalogStore, SystemActivity},
};
use strike_store_sqlite::{SqliteStore, StoreOptions};
use tokio_util::sync::CancellationToken;

use crate::{Phase, SyncConfig, SyncOrchestrator, UpsertOutcome, UpsertWriter};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// A remote collection held in memory. Detail lookups for ids without an
/// entry in `details` miss.
struct FakeRemote {
  collection:   Vec<Value>,
  complete:     bool,
  details:      HashMap<i64, Value>,
  detail_calls: AtomicUsize,
  /// Fire the token once this many detail requests have been made.
  cancel_after: Option<(usize, CancellationToken)>,
  /// Fire the token while the collection is being fetched.
  cancel_on_fetch: Option<CancellationToken>,
}

impl FakeRemote {
  fn new(collection: Vec<Value>) -> Self {
    Self {
      collection,
      complete: true,
      details: HashMap::new(),
      detail_calls: AtomicUsize::new(0),
      cancel_after: None,
      cancel_on_fetch: None,
    }
  }

  /// Systems `ids` with bulk rows lacking a region and details carrying one.
  fn systems(ids: impl IntoIterator<Item = i64>) -> Self {
    let ids: Vec<i64> = ids.into_iter().collect();
    let mut remote = Self::new(ids.iter().map(|id| json!({ "id": id, "name": format!("S-{id}") })).collect());
    remote.details = ids
      .iter()
      .map(|&id| {
        let detail = json!({
          "id": id,
          "name": format!("S-{id}"),
          "regionId": 10_000_000 + id,
          "location": { "x": 1.0, "y": 2.0, "z": id as f64 },
        });
        (id, detail)
      })
      .collect();
    remote
  }

  fn without_detail(mut self, id: i64) -> Self {
    self.details.remove(&id);
    self
  }

  fn calls(&self) -> usize { self.detail_calls.load(Ordering::SeqCst) }
}

impl CollectionSource for FakeRemote {
  async fn fetch_all(&self) -> FetchedCollection {
    if let Some(token) = &self.cancel_on_fetch {
      token.cancel();
    }
    FetchedCollection { records: self.collection.clone(), pages: 1, complete: self.complete }
  }
}

impl DetailSource for FakeRemote {
  async fn fetch_detail(&self, id: i64) -> Option<RawRecord> {
    let calls = self.detail_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some((after, token)) = &self.cancel_after
      && calls >= *after
    {
      token.cancel();
    }
    self.details.get(&id).cloned()
  }
}

#[derive(Debug, thiserror::Error)]
enum FlakyError {
  #[error("injected storage failure")]
  Injected,
  #[error(transparent)]
  Store(#[from] strike_store_sqlite::Error),
}

/// Delegates to an in-memory store, failing the chosen write paths.
struct FlakyStore {
  inner:       SqliteStore,
  fail_batch:  bool,
  fail_single: bool,
}

impl CatalogStore for FlakyStore {
  type Error = FlakyError;

  async fn upsert_batch<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize, FlakyError> {
    if self.fail_batch {
      return Err(FlakyError::Injected);
    }
    Ok(self.inner.upsert_batch(records).await?)
  }

  async fn upsert_one<R: CatalogRecord>(&self, record: R) -> Result<(), FlakyError> {
    if self.fail_single {
      return Err(FlakyError::Injected);
    }
    Ok(self.inner.upsert_one(record).await?)
  }

  async fn record_run(&self, run: RunRecord) -> Result<(), FlakyError> {
    Ok(self.inner.record_run(run).await?)
  }

  async fn existing_ids(&self, kind: RecordKind, ids: Vec<i64>) -> Result<HashSet<i64>, FlakyError> {
    Ok(self.inner.existing_ids(kind, ids).await?)
  }

  async fn count(&self, kind: RecordKind) -> Result<u64, FlakyError> {
    Ok(self.inner.count(kind).await?)
  }

  async fn get_system(&self, id: i64) -> Result<Option<SolarSystem>, FlakyError> {
    Ok(self.inner.get_system(id).await?)
  }

  async fn list_systems(&self) -> Result<Vec<SolarSystem>, FlakyError> {
    Ok(self.inner.list_systems().await?)
  }

  async fn get_incident(&self, id: i64) -> Result<Option<Incident>, FlakyError> {
    Ok(self.inner.get_incident(id).await?)
  }

  async fn system_activity(&self) -> Result<Vec<SystemActivity>, FlakyError> {
    Ok(self.inner.system_activity().await?)
  }

  async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, FlakyError> {
    Ok(self.inner.recent_runs(limit).await?)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn config() -> SyncConfig {
  SyncConfig { detail_delay_ms: 0, ..Default::default() }
}

fn incident(id: i64, system_id: i64) -> Value {
  json!({
    "id": id,
    "victim_name": "Ash",
    "killer_name": "Vex",
    "loss_type": "ship",
    "time_stamp": 1_738_000_000,
    "solar_system_id": system_id,
    "solar_system_name": format!("S-{system_id}"),
  })
}

// ─── Systems: bulk then detail ───────────────────────────────────────────────

#[tokio::test]
async fn bulk_then_detail_enriches_every_system() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=3);
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert!(report.is_clean());
  assert_eq!(report.counts.fetched, 3);
  assert_eq!(report.counts.bulk_written, 3);
  assert_eq!(report.counts.enriched, 3);
  assert_eq!(remote.calls(), 3);

  let two = s.get_system(2).await.unwrap().unwrap();
  assert_eq!(two.region_id, Some(10_000_002));
  assert_eq!(two.coordinates.unwrap().z, 2.0);
}

#[tokio::test]
async fn failed_detail_keeps_bulk_row() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=10).without_detail(5);
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert!(!report.is_clean());
  assert_eq!(report.counts.enriched, 9);
  assert_eq!(report.counts.missed, 1);
  assert_eq!(report.missed_ids, vec![5]);

  let five = s.get_system(5).await.unwrap().unwrap();
  assert_eq!(five.name, "S-5");
  assert_eq!(five.region_id, None);
  assert_eq!(s.get_system(6).await.unwrap().unwrap().region_id, Some(10_000_006));
}

#[tokio::test]
async fn repeated_sync_is_idempotent() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=5);
  let cfg = config();
  let orchestrator = SyncOrchestrator::new(&s, &remote, &cfg);

  orchestrator.run::<SolarSystem>().await;
  let first = s.list_systems().await.unwrap();
  orchestrator.run::<SolarSystem>().await;
  let second = s.list_systems().await.unwrap();

  assert_eq!(first.len(), 5);
  assert_eq!(first, second);
}

#[tokio::test]
async fn empty_fetch_leaves_store_untouched() {
  let s = store().await;
  let cfg = config();
  SyncOrchestrator::new(&s, &FakeRemote::systems(1..=4), &cfg)
    .run::<SolarSystem>()
    .await;
  let before = s.list_systems().await.unwrap();

  let mut empty = FakeRemote::new(Vec::new());
  empty.complete = false;
  let report = SyncOrchestrator::new(&s, &empty, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::FailedEmpty);
  assert_eq!(report.counts.bulk_written, 0);
  assert_eq!(s.list_systems().await.unwrap(), before);
}

#[tokio::test]
async fn incomplete_fetch_still_loads_what_arrived() {
  let s = store().await;
  let mut remote = FakeRemote::systems(1..=3);
  remote.complete = false;
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert!(!report.counts.fetch_complete);
  assert!(!report.is_clean());
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 3);
}

#[tokio::test]
async fn invalid_bulk_records_are_rejected_not_enriched() {
  let s = store().await;
  let mut remote = FakeRemote::systems(1..=3);
  remote.collection.push(json!({ "id": 4 }));
  remote.collection.push(json!("garbage"));
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert_eq!(report.counts.fetched, 5);
  assert_eq!(report.counts.bulk_written, 3);
  assert_eq!(report.counts.rejected, 2);
  assert_eq!(report.counts.missed, 0);
  assert_eq!(report.rejections[0].id, Some(4));
  assert_eq!(report.rejections[1].id, None);
  assert_eq!(remote.calls(), 3);
}

#[tokio::test]
async fn duplicate_ids_are_enriched_once() {
  let s = store().await;
  let mut remote = FakeRemote::systems([1, 2]);
  remote.collection.push(json!({ "id": 1, "name": "again" }));
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.counts.bulk_written, 3);
  assert_eq!(report.counts.enriched, 2);
  assert_eq!(remote.calls(), 2);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 2);
}

#[tokio::test]
async fn mismatched_detail_id_is_rejected() {
  let s = store().await;
  let mut remote = FakeRemote::systems([1, 2]);
  remote.details.insert(2, json!({ "id": 99, "name": "Imposter" }));
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert_eq!(report.counts.enriched, 1);
  assert_eq!(report.counts.rejected, 1);
  assert_eq!(report.rejections[0].id, Some(2));
  assert!(s.get_system(99).await.unwrap().is_none());
  assert_eq!(s.get_system(2).await.unwrap().unwrap().name, "S-2");
}

#[tokio::test]
async fn detail_disabled_skips_enrichment() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=3);
  let mut cfg = config();
  cfg.systems.detail = false;

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert_eq!(report.counts.enriched, 0);
  assert_eq!(remote.calls(), 0);
}

// ─── Storage failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_storage_failure_aborts() {
  let s = FlakyStore { inner: store().await, fail_batch: true, fail_single: false };
  let remote = FakeRemote::systems(1..=3);
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::AbortedStorage);
  assert_eq!(remote.calls(), 0);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 0);
}

#[tokio::test]
async fn detail_storage_failure_aborts_and_keeps_bulk_rows() {
  let s = FlakyStore { inner: store().await, fail_batch: false, fail_single: true };
  let remote = FakeRemote::systems(1..=3);
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.status, RunStatus::AbortedStorage);
  assert_eq!(report.counts.bulk_written, 3);
  assert_eq!(report.counts.enriched, 0);
  assert_eq!(remote.calls(), 1);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 3);

  let runs = s.recent_runs(1).await.unwrap();
  assert_eq!(runs[0].status, RunStatus::AbortedStorage);
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=3);
  let cfg = config();
  let cancel = CancellationToken::new();
  cancel.cancel();

  let report = SyncOrchestrator::new(&s, &remote, &cfg)
    .with_cancellation(cancel)
    .run::<SolarSystem>()
    .await;

  assert_eq!(report.status, RunStatus::Cancelled);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 0);
}

#[tokio::test]
async fn cancel_during_fetch_skips_bulk_load() {
  let s = store().await;
  let cancel = CancellationToken::new();
  let mut remote = FakeRemote::systems(1..=5);
  remote.complete = false;
  remote.cancel_on_fetch = Some(cancel.clone());
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg)
    .with_cancellation(cancel)
    .run::<SolarSystem>()
    .await;

  assert_eq!(report.status, RunStatus::Cancelled);
  assert_eq!(report.counts.fetched, 5);
  assert!(!report.counts.fetch_complete);
  assert_eq!(report.counts.bulk_written, 0);
  assert_eq!(remote.calls(), 0);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 0);
}

#[tokio::test]
async fn cancel_during_detail_keeps_applied_rows() {
  let s = store().await;
  let cancel = CancellationToken::new();
  let mut remote = FakeRemote::systems(1..=10);
  remote.cancel_after = Some((3, cancel.clone()));
  let cfg = config();

  let report = SyncOrchestrator::new(&s, &remote, &cfg)
    .with_cancellation(cancel)
    .run::<SolarSystem>()
    .await;

  assert_eq!(report.status, RunStatus::Cancelled);
  assert_eq!(remote.calls(), 3);
  assert_eq!(report.counts.enriched, 3);
  assert_eq!(s.count(RecordKind::Systems).await.unwrap(), 10);
  assert_eq!(s.get_system(3).await.unwrap().unwrap().region_id, Some(10_000_003));
  assert_eq!(s.get_system(4).await.unwrap().unwrap().region_id, None);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_pacing_wait() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=3);
  let mut cfg = config();
  cfg.detail_delay_ms = 60_000;
  let cancel = CancellationToken::new();
  let orchestrator = SyncOrchestrator::new(&s, &remote, &cfg).with_cancellation(cancel.clone());

  let mut run = orchestrator.start::<SolarSystem>();
  assert_eq!(orchestrator.step(&mut run).await, Phase::Detail { next: 0 });
  assert_eq!(orchestrator.step(&mut run).await, Phase::Detail { next: 1 });

  let canceller = tokio::spawn(async move {
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
  });
  let start = tokio::time::Instant::now();
  assert_eq!(orchestrator.step(&mut run).await, Phase::Finished(RunStatus::Cancelled));
  assert!(start.elapsed() < Duration::from_secs(60));
  canceller.await.unwrap();
  assert_eq!(remote.calls(), 1);
}

// ─── Pacing and stepping ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn detail_requests_are_paced() {
  let s = store().await;
  let remote = FakeRemote::systems(1..=5);
  let mut cfg = config();
  cfg.detail_delay_ms = 100;

  let start = tokio::time::Instant::now();
  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<SolarSystem>().await;

  assert_eq!(report.counts.enriched, 5);
  assert!(start.elapsed() >= Duration::from_millis(400), "{:?}", start.elapsed());
}

#[tokio::test]
async fn steps_walk_the_phases_in_order() {
  let s = store().await;
  let remote = FakeRemote::systems([7, 8]);
  let cfg = config();
  let orchestrator = SyncOrchestrator::new(&s, &remote, &cfg);

  let mut run = orchestrator.start::<SolarSystem>();
  assert_eq!(run.phase(), Phase::Bulk);
  assert_eq!(run.status(), None);

  assert_eq!(orchestrator.step(&mut run).await, Phase::Detail { next: 0 });
  assert_eq!(run.entities(), &[7, 8]);
  assert_eq!(orchestrator.step(&mut run).await, Phase::Detail { next: 1 });
  assert_eq!(orchestrator.step(&mut run).await, Phase::Detail { next: 2 });
  assert_eq!(orchestrator.step(&mut run).await, Phase::Finished(RunStatus::Done));
  assert_eq!(run.status(), Some(RunStatus::Done));

  // Terminal phases stay put.
  assert_eq!(orchestrator.step(&mut run).await, Phase::Finished(RunStatus::Done));
  assert_eq!(run.counts().enriched, 2);
  assert_eq!(remote.calls(), 2);
}

// ─── Incidents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn incidents_skip_detail_and_reject_unknown_systems() {
  let s = store().await;
  let cfg = config();
  SyncOrchestrator::new(&s, &FakeRemote::systems([30_000_001]), &cfg)
    .run::<SolarSystem>()
    .await;

  let remote = FakeRemote::new(vec![
    incident(1, 30_000_001),
    incident(2, 30_000_001),
    incident(3, 31_999_999),
  ]);
  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<Incident>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert_eq!(report.counts.bulk_written, 2);
  assert_eq!(report.counts.rejected, 1);
  assert_eq!(report.rejections[0].id, Some(3));
  assert!(report.rejections[0].reason.contains("31999999"), "{}", report.rejections[0].reason);
  assert_eq!(remote.calls(), 0);

  let activity = s.system_activity().await.unwrap();
  assert_eq!(activity.len(), 1);
  assert_eq!(activity[0].incident_count, 2);
}

#[tokio::test]
async fn relaxed_references_accept_unknown_systems() {
  let s = SqliteStore::open_in_memory_with(StoreOptions { foreign_keys: false, ..Default::default() })
    .await
    .unwrap();
  let cfg = SyncConfig { relax_incident_fk: true, ..config() };
  let remote = FakeRemote::new(vec![incident(1, 31_999_999)]);

  let report = SyncOrchestrator::new(&s, &remote, &cfg).run::<Incident>().await;

  assert_eq!(report.status, RunStatus::Done);
  assert_eq!(report.counts.rejected, 0);
  assert_eq!(s.get_incident(1).await.unwrap().unwrap().solar_system_id, Some(31_999_999));
}

// ─── Run log ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn finished_runs_are_logged() {
  let s = store().await;
  let cfg = config();
  let report = SyncOrchestrator::new(&s, &FakeRemote::systems(1..=2), &cfg)
    .run::<SolarSystem>()
    .await;

  let runs = s.recent_runs(5).await.unwrap();
  assert_eq!(runs.len(), 1);
  assert_eq!(runs[0].run_id, report.run_id);
  assert_eq!(runs[0].collection, RecordKind::Systems);
  assert_eq!(runs[0].status, RunStatus::Done);
  assert_eq!(runs[0].counts, report.counts);
}

// ─── Writer ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn writer_defaults_missing_incident_fields() {
  let s = store().await;
  let writer = UpsertWriter::new(&s, false);

  let outcome = writer
    .upsert_one::<Incident>(&json!({ "id": 9, "killer_name": "Vex" }))
    .await
    .unwrap();
  assert_eq!(outcome, UpsertOutcome::Written);

  let stored = s.get_incident(9).await.unwrap().unwrap();
  assert_eq!(stored.victim_address, "");
  assert_eq!(stored.killer_name, "Vex");
  assert_eq!(stored.time_stamp, 0);
}

#[tokio::test]
async fn writer_batch_skips_invalid_records() {
  let s = store().await;
  let writer = UpsertWriter::new(&s, true);

  let outcome = writer
    .upsert_batch::<SolarSystem>(&[
      json!({ "id": 1, "name": "A", "regionId": 5 }),
      json!({ "id": "two", "name": "B" }),
      json!({ "id": 1, "name": "B", "regionId": 9 }),
    ])
    .await
    .unwrap();

  assert_eq!(outcome.written, 2);
  assert_eq!(outcome.ids, vec![1]);
  assert_eq!(outcome.rejected.len(), 1);

  let one = s.get_system(1).await.unwrap().unwrap();
  assert_eq!((one.name.as_str(), one.region_id), ("B", Some(9)));
}

#[tokio::test]
async fn writer_rejects_single_dangling_reference() {
  let s = store().await;
  let writer = UpsertWriter::new(&s, true);

  let outcome = writer.upsert_one::<Incident>(&incident(1, 42)).await.unwrap();

  assert!(matches!(outcome, UpsertOutcome::Rejected(ref r) if r.id == Some(1)), "{outcome:?}");
  assert!(s.get_incident(1).await.unwrap().is_none());
}
