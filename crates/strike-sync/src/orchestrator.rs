//! The two-phase sync state machine.
//!
//! ```text
//! Bulk ──cancelled──────────▶ Finished(Cancelled)
//!  │  ──empty───────────────▶ Finished(FailedEmpty)
//!  │  ──store error─────────▶ Finished(AbortedStorage)
//!  │  ──detail disabled─────▶ Finished(Done)
//!  ▼
//! Detail { next } ──miss / enriched / rejected──▶ Detail { next + 1 }
//!  │  ──store error─────────▶ Finished(AbortedStorage)
//!  │  ──cancelled───────────▶ Finished(Cancelled)
//!  ▼
//! Finished(Done)
//! ```

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use strike_core::{
  CatalogRecord,
  record::raw_id,
  run::{Rejection, RunCounts, RunStatus, SyncReport},
  source::{CollectionSource, DetailSource},
  store::CatalogStore,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Pacer, SyncConfig,
  writer::{UpsertOutcome, UpsertWriter},
};

/// Where a [`SyncRun`] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Bulk,
  /// Enriching `entities[next]`.
  Detail { next: usize },
  Finished(RunStatus),
}

/// The mutable state of one run over the collection of `R`.
#[derive(Debug)]
pub struct SyncRun<R> {
  run_id:     Uuid,
  started_at: DateTime<Utc>,
  phase:      Phase,
  /// Ids written by the bulk phase, in fetch order, without duplicates.
  entities:   Vec<i64>,
  counts:     RunCounts,
  missed_ids: Vec<i64>,
  rejections: Vec<Rejection>,
  detail:     bool,
  pacer:      Pacer,
  _record:    PhantomData<fn() -> R>,
}

impl<R: CatalogRecord> SyncRun<R> {
  pub fn phase(&self) -> Phase { self.phase }

  pub fn counts(&self) -> &RunCounts { &self.counts }

  pub fn entities(&self) -> &[i64] { &self.entities }

  /// The terminal status, once there is one.
  pub fn status(&self) -> Option<RunStatus> {
    match self.phase {
      Phase::Finished(status) => Some(status),
      _ => None,
    }
  }

  fn reject(&mut self, rejection: Rejection) {
    self.counts.rejected += 1;
    self.rejections.push(rejection);
  }

  fn into_report(self, status: RunStatus) -> SyncReport {
    SyncReport {
      run_id: self.run_id,
      collection: R::KIND,
      status,
      started_at: self.started_at,
      finished_at: Utc::now(),
      counts: self.counts,
      missed_ids: self.missed_ids,
      rejections: self.rejections,
    }
  }
}

/// Drives [`SyncRun`]s against a source and a store.
///
/// The orchestrator never retries. A run that ends in anything other than
/// [`RunStatus::Done`] is meant to be started again from scratch; upserts
/// make that safe.
pub struct SyncOrchestrator<'a, St, Src> {
  writer: UpsertWriter<'a, St>,
  source: &'a Src,
  config: &'a SyncConfig,
  cancel: CancellationToken,
}

impl<'a, St, Src> SyncOrchestrator<'a, St, Src>
where
  St: CatalogStore,
  Src: CollectionSource + DetailSource,
{
  pub fn new(store: &'a St, source: &'a Src, config: &'a SyncConfig) -> Self {
    Self {
      writer: UpsertWriter::new(store, !config.relax_incident_fk),
      source,
      config,
      cancel: CancellationToken::new(),
    }
  }

  /// Stop runs when `cancel` fires. Checked around the collection fetch,
  /// before every detail request and while pacing; a request already in
  /// flight is allowed to finish. A fetch cut short by cancellation is not
  /// bulk-loaded.
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// A fresh run in [`Phase::Bulk`].
  pub fn start<R: CatalogRecord>(&self) -> SyncRun<R> {
    SyncRun {
      run_id:     Uuid::new_v4(),
      started_at: Utc::now(),
      phase:      Phase::Bulk,
      entities:   Vec::new(),
      counts:     RunCounts::default(),
      missed_ids: Vec::new(),
      rejections: Vec::new(),
      detail:     self.config.collection(R::KIND).detail,
      pacer:      Pacer::new(self.config.detail_delay()),
      _record:    PhantomData,
    }
  }

  /// Advance `run` by one transition and return the new phase. A finished
  /// run is left as it is.
  pub async fn step<R: CatalogRecord>(&self, run: &mut SyncRun<R>) -> Phase {
    let phase = run.phase;
    run.phase = match phase {
      Phase::Bulk => self.bulk(run).await,
      Phase::Detail { next } => self.detail(run, next).await,
      finished @ Phase::Finished(_) => finished,
    };
    run.phase
  }

  /// Run a full sync of `R`'s collection, append it to the run log, and
  /// return its report.
  pub async fn run<R: CatalogRecord>(&self) -> SyncReport {
    let mut run = self.start::<R>();
    let span = tracing::info_span!("sync", collection = %R::KIND, run_id = %run.run_id);

    async move {
      tracing::info!("sync started");
      let status = loop {
        if let Phase::Finished(status) = self.step(&mut run).await {
          break status;
        }
      };
      let report = run.into_report(status);

      if let Err(e) = self.writer.store().record_run(report.run_record()).await {
        tracing::warn!(error = %e, "failed to record run");
      }

      let c = &report.counts;
      if report.is_clean() {
        tracing::info!(
          status = %report.status,
          fetched = c.fetched,
          bulk_written = c.bulk_written,
          enriched = c.enriched,
          "sync finished"
        );
      } else {
        tracing::warn!(
          status = %report.status,
          fetched = c.fetched,
          fetch_complete = c.fetch_complete,
          bulk_written = c.bulk_written,
          enriched = c.enriched,
          missed = c.missed,
          rejected = c.rejected,
          "sync finished with gaps"
        );
      }
      report
    }
    .instrument(span)
    .await
  }

  async fn bulk<R: CatalogRecord>(&self, run: &mut SyncRun<R>) -> Phase {
    if self.cancel.is_cancelled() {
      return Phase::Finished(RunStatus::Cancelled);
    }

    let fetched = self.source.fetch_all().await;
    run.counts.fetched = fetched.records.len();
    run.counts.pages = fetched.pages;
    run.counts.fetch_complete = fetched.complete;

    if self.cancel.is_cancelled() {
      tracing::warn!(fetched = fetched.records.len(), "cancelled during fetch; nothing loaded");
      return Phase::Finished(RunStatus::Cancelled);
    }
    if fetched.is_empty() {
      tracing::warn!(pages = fetched.pages, "collection fetch returned nothing; store left untouched");
      return Phase::Finished(RunStatus::FailedEmpty);
    }
    if !fetched.complete {
      tracing::warn!(fetched = fetched.records.len(), "collection fetch incomplete; loading what arrived");
    }

    let outcome = match self.writer.upsert_batch::<R>(&fetched.records).await {
      Ok(outcome) => outcome,
      Err(e) => {
        tracing::error!(error = %e, "bulk upsert failed");
        return Phase::Finished(RunStatus::AbortedStorage);
      }
    };

    run.counts.bulk_written = outcome.written;
    for rejection in outcome.rejected {
      run.reject(rejection);
    }
    run.entities = outcome.ids;
    tracing::info!(
      written = run.counts.bulk_written,
      rejected = run.counts.rejected,
      "bulk phase complete"
    );

    if run.detail && !run.entities.is_empty() {
      Phase::Detail { next: 0 }
    } else {
      Phase::Finished(RunStatus::Done)
    }
  }

  async fn detail<R: CatalogRecord>(&self, run: &mut SyncRun<R>, next: usize) -> Phase {
    let Some(&id) = run.entities.get(next) else {
      tracing::info!(
        enriched = run.counts.enriched,
        missed = run.counts.missed,
        "detail phase complete"
      );
      return Phase::Finished(RunStatus::Done);
    };

    if self.cancel.is_cancelled() {
      return Phase::Finished(RunStatus::Cancelled);
    }
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Phase::Finished(RunStatus::Cancelled),
      _ = run.pacer.pace() => {}
    }

    let Some(raw) = self.source.fetch_detail(id).await else {
      tracing::debug!(id, "detail miss; keeping bulk row");
      run.counts.missed += 1;
      run.missed_ids.push(id);
      return Phase::Detail { next: next + 1 };
    };

    if let Some(got) = raw_id(&raw).filter(|got| *got != id) {
      run.reject(Rejection {
        id:     Some(id),
        reason: format!("detail record has id {got}, expected {id}"),
      });
      return Phase::Detail { next: next + 1 };
    }

    match self.writer.upsert_one::<R>(&raw).await {
      Ok(UpsertOutcome::Written) => {
        tracing::debug!(id, "enriched");
        run.counts.enriched += 1;
      }
      Ok(UpsertOutcome::Rejected(rejection)) => {
        tracing::warn!(id, reason = %rejection.reason, "detail record rejected");
        run.reject(rejection);
      }
      Err(e) => {
        tracing::error!(id, error = %e, "detail upsert failed");
        return Phase::Finished(RunStatus::AbortedStorage);
      }
    }
    Phase::Detail { next: next + 1 }
  }
}
