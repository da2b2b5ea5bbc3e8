//! SQL schema for the Strike SQLite store.
//!
//! Executed once at connection startup. Table names come from configuration,
//! so the DDL is rendered rather than constant; names are validated as plain
//! identifiers before they get here.

use strike_core::store::TableNames;

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub fn schema(tables: &TableNames) -> String {
  let TableNames { systems, incidents, runs } = tables;
  format!(
    "
PRAGMA journal_mode = WAL;

-- Rows are created and overwritten by upserts; the sync never deletes.
CREATE TABLE IF NOT EXISTS {systems} (
    solar_system_id   INTEGER PRIMARY KEY,
    solar_system_name TEXT NOT NULL COLLATE NOCASE,
    region_id         INTEGER,          -- NULL = region unknown
    x                 REAL,
    y                 REAL,
    z                 REAL
);

CREATE TABLE IF NOT EXISTS {incidents} (
    id                INTEGER PRIMARY KEY,
    victim_address    TEXT NOT NULL DEFAULT '',
    victim_name       TEXT NOT NULL DEFAULT '',
    loss_type         TEXT NOT NULL DEFAULT '',
    killer_address    TEXT NOT NULL DEFAULT '',
    killer_name       TEXT NOT NULL DEFAULT '',
    time_stamp        INTEGER NOT NULL DEFAULT 0,
    solar_system_id   INTEGER REFERENCES {systems}(solar_system_id),
    solar_system_name TEXT NOT NULL DEFAULT ''   -- name as observed, not kept in sync
);

-- One row per finished sync run.
CREATE TABLE IF NOT EXISTS {runs} (
    run_id         TEXT PRIMARY KEY,
    collection     TEXT NOT NULL,    -- 'systems' | 'incidents'
    status         TEXT NOT NULL,
    started_at     TEXT NOT NULL,    -- RFC 3339 UTC
    finished_at    TEXT NOT NULL,
    fetched        INTEGER NOT NULL,
    pages          INTEGER NOT NULL,
    fetch_complete INTEGER NOT NULL,
    bulk_written   INTEGER NOT NULL,
    enriched       INTEGER NOT NULL,
    missed         INTEGER NOT NULL,
    rejected       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS {incidents}_system_idx ON {incidents}(solar_system_id);
CREATE INDEX IF NOT EXISTS {runs}_started_idx    ON {runs}(started_at);

PRAGMA user_version = {SCHEMA_VERSION};
"
  )
}
