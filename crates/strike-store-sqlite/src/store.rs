//! [`SqliteStore`], the SQLite implementation of [`CatalogStore`].

use std::{collections::HashSet, path::Path, sync::Arc};

use rusqlite::{OptionalExtension as _, types::Value};
use strike_core::{
  CatalogRecord, Incident, RecordKind, SolarSystem,
  run::RunRecord,
  store::{CatalogStore, SystemActivity, TableNames},
};

use crate::{
  Error, Result,
  encode::{
    RawActivity, RawRun, RawSystem, encode_count, encode_dt, encode_uuid, incident_from_row,
    to_sql_value,
  },
  schema::schema,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// How to open a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
  pub tables:       TableNames,
  /// Enforce `incident.solar_system_id → systems`. When off, incidents may
  /// point at systems that have not been imported yet.
  pub foreign_keys: bool,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { tables: TableNames::default(), foreign_keys: true } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A catalog store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  tables:          Arc<TableNames>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    options.tables.validate()?;
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store with default options.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreOptions::default()).await
  }

  pub async fn open_in_memory_with(options: StoreOptions) -> Result<Self> {
    options.tables.validate()?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let ddl = schema(&options.tables);
    let foreign_keys = options.foreign_keys;
    conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        conn.pragma_update(None, "foreign_keys", foreign_keys)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, tables: Arc::new(options.tables) })
  }

  /// `INSERT … ON CONFLICT DO UPDATE` for `R`, overwriting every non-key
  /// column.
  fn upsert_sql<R: CatalogRecord>(&self) -> String {
    let table = self.tables.for_kind(R::KIND);
    let key = R::KIND.key_column();
    let placeholders = (1..=R::COLUMNS.len() + 1)
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let updates = R::COLUMNS
      .iter()
      .map(|c| format!("{c} = excluded.{c}"))
      .collect::<Vec<_>>()
      .join(", ");
    format!(
      "INSERT INTO {table} ({key}, {columns}) VALUES ({placeholders})
       ON CONFLICT ({key}) DO UPDATE SET {updates}",
      columns = R::COLUMNS.join(", "),
    )
  }
}

/// Flatten records into parameter rows: key first, then the declared columns.
fn encode_rows<R: CatalogRecord>(records: Vec<R>) -> Result<Vec<Vec<Value>>> {
  records
    .into_iter()
    .map(|record| {
      let values = record.values();
      if values.len() != R::COLUMNS.len() {
        return Err(Error::ColumnMismatch {
          kind:     R::KIND,
          id:       record.id(),
          expected: R::COLUMNS.len(),
          got:      values.len(),
        });
      }
      let mut row = Vec::with_capacity(values.len() + 1);
      row.push(Value::Integer(record.id()));
      row.extend(values.into_iter().map(to_sql_value));
      Ok(row)
    })
    .collect()
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_batch<R: CatalogRecord>(&self, records: Vec<R>) -> Result<usize> {
    if records.is_empty() {
      return Ok(0);
    }
    let sql = self.upsert_sql::<R>();
    let rows = encode_rows(records)?;

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(&sql)?;
          for row in &rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;

    tracing::debug!(kind = %R::KIND, written, "batch upserted");
    Ok(written)
  }

  async fn upsert_one<R: CatalogRecord>(&self, record: R) -> Result<()> {
    let sql = self.upsert_sql::<R>();
    let rows = encode_rows(vec![record])?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(&sql, rusqlite::params_from_iter(rows[0].iter()))?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_run(&self, run: RunRecord) -> Result<()> {
    let sql = format!(
      "INSERT INTO {} (
         run_id, collection, status, started_at, finished_at,
         fetched, pages, fetch_complete, bulk_written, enriched, missed, rejected
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
      self.tables.runs
    );
    let run_id_str   = encode_uuid(run.run_id);
    let collection   = run.collection.as_str();
    let status       = run.status.as_str();
    let started_str  = encode_dt(run.started_at);
    let finished_str = encode_dt(run.finished_at);
    let c            = run.counts;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &sql,
          rusqlite::params![
            run_id_str,
            collection,
            status,
            started_str,
            finished_str,
            encode_count(c.fetched),
            encode_count(c.pages),
            c.fetch_complete,
            encode_count(c.bulk_written),
            encode_count(c.enriched),
            encode_count(c.missed),
            encode_count(c.rejected),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn existing_ids(&self, kind: RecordKind, ids: Vec<i64>) -> Result<HashSet<i64>> {
    let sql = format!(
      "SELECT 1 FROM {} WHERE {} = ?1",
      self.tables.for_kind(kind),
      kind.key_column()
    );

    let found = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut found = HashSet::new();
        for id in ids {
          if stmt.exists([id])? {
            found.insert(id);
          }
        }
        Ok(found)
      })
      .await?;
    Ok(found)
  }

  async fn count(&self, kind: RecordKind) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", self.tables.for_kind(kind));
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or(0))
  }

  async fn get_system(&self, id: i64) -> Result<Option<SolarSystem>> {
    let sql = format!(
      "SELECT solar_system_id, solar_system_name, region_id, x, y, z
       FROM {} WHERE solar_system_id = ?1",
      self.tables.systems
    );

    let raw: Option<RawSystem> = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [id], RawSystem::from_row).optional()?))
      .await?;
    Ok(raw.map(RawSystem::into_system))
  }

  async fn list_systems(&self) -> Result<Vec<SolarSystem>> {
    let sql = format!(
      "SELECT solar_system_id, solar_system_name, region_id, x, y, z
       FROM {} ORDER BY solar_system_id",
      self.tables.systems
    );

    let raws: Vec<RawSystem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSystem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws.into_iter().map(RawSystem::into_system).collect())
  }

  async fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
    let sql = format!(
      "SELECT id, victim_address, victim_name, loss_type, killer_address,
              killer_name, time_stamp, solar_system_id, solar_system_name
       FROM {} WHERE id = ?1",
      self.tables.incidents
    );

    let incident = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [id], incident_from_row).optional()?))
      .await?;
    Ok(incident)
  }

  async fn system_activity(&self) -> Result<Vec<SystemActivity>> {
    let sql = format!(
      "SELECT s.solar_system_id, s.solar_system_name, s.region_id, s.x, s.y, s.z,
              COUNT(i.id) AS incident_count
       FROM {systems} s
       LEFT JOIN {incidents} i ON i.solar_system_id = s.solar_system_id
       GROUP BY s.solar_system_id
       ORDER BY s.solar_system_id",
      systems = self.tables.systems,
      incidents = self.tables.incidents,
    );

    let raws: Vec<RawActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawActivity { system: RawSystem::from_row(row)?, incident_count: row.get(6)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws.into_iter().map(RawActivity::into_activity).collect())
  }

  async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
    let sql = format!(
      "SELECT run_id, collection, status, started_at, finished_at,
              fetched, pages, fetch_complete, bulk_written, enriched, missed, rejected
       FROM {}
       ORDER BY started_at DESC, rowid DESC
       LIMIT ?1",
      self.tables.runs
    );
    let limit_val = encode_count(limit);

    let raws: Vec<RawRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([limit_val], |row| {
            Ok(RawRun {
              run_id:         row.get(0)?,
              collection:     row.get(1)?,
              status:         row.get(2)?,
              started_at:     row.get(3)?,
              finished_at:    row.get(4)?,
              fetched:        row.get(5)?,
              pages:          row.get(6)?,
              fetch_complete: row.get(7)?,
              bulk_written:   row.get(8)?,
              enriched:       row.get(9)?,
              missed:         row.get(10)?,
              rejected:       row.get(11)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_record).collect()
  }
}
