//! The `CatalogStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `strike-store-sqlite`).
//! The sync engine and the CLI depend on this abstraction, not on any
//! concrete backend.

use std::{collections::HashSet, future::Future};

use serde::{Deserialize, Serialize};

use crate::{
  CatalogRecord, Coordinates, Error, Incident, RecordKind, Result, SolarSystem,
  run::RunRecord,
};

// ─── Table names ─────────────────────────────────────────────────────────────

/// Names of the tables a store writes to. Configurable so several catalogs
/// can share one database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
  pub systems:   String,
  pub incidents: String,
  pub runs:      String,
}

impl Default for TableNames {
  fn default() -> Self {
    Self {
      systems:   "systems".to_owned(),
      incidents: "incident".to_owned(),
      runs:      "sync_runs".to_owned(),
    }
  }
}

impl TableNames {
  /// Table holding records of `kind`.
  pub fn for_kind(&self, kind: RecordKind) -> &str {
    match kind {
      RecordKind::Systems => &self.systems,
      RecordKind::Incidents => &self.incidents,
    }
  }

  /// Table names end up spliced into SQL unquoted, so only plain
  /// identifiers that are not SQL keywords are accepted, and no two tables
  /// may share a name. SQLite compares identifiers case-insensitively.
  pub fn validate(&self) -> Result<()> {
    let names = [&self.systems, &self.incidents, &self.runs];
    for (i, name) in names.iter().enumerate() {
      if !is_identifier(name) || is_reserved(name) {
        return Err(Error::InvalidTableName((*name).clone()));
      }
      if names[..i].iter().any(|other| other.eq_ignore_ascii_case(name)) {
        return Err(Error::DuplicateTableName((*name).clone()));
      }
    }
    Ok(())
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQLite keywords (sqlite.org/lang_keywords.html) plus the `sqlite_`
/// namespace reserved for internal tables.
fn is_reserved(s: &str) -> bool {
  const KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY",
    "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT", "NOTHING",
    "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS", "OUTER", "OVER",
    "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE", "RANGE",
    "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT",
    "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET", "TABLE", "TEMP",
    "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED", "UNION", "UNIQUE",
    "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW", "WITH",
    "WITHOUT",
  ];
  s.get(..7).is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
    || KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(s))
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// A system together with the number of incidents recorded in it, the
/// shape visualization consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemActivity {
  pub solar_system_id:   i64,
  pub solar_system_name: String,
  pub region_id:         Option<i64>,
  pub coordinates:       Option<Coordinates>,
  pub incident_count:    u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a catalog storage backend.
///
/// Writes are upserts: a row is created on first write and every non-key
/// column is overwritten on later writes with the same key. Nothing is ever
/// deleted.
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert all `records` in one transaction and return the number written.
  /// Either every record commits or none does.
  fn upsert_batch<R: CatalogRecord>(
    &self,
    records: Vec<R>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert a single record in its own transaction.
  fn upsert_one<R: CatalogRecord>(
    &self,
    record: R,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append a finished run to the run log.
  fn record_run(
    &self,
    run: RunRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The subset of `ids` that exist in the table for `kind`.
  fn existing_ids(
    &self,
    kind: RecordKind,
    ids: Vec<i64>,
  ) -> impl Future<Output = Result<HashSet<i64>, Self::Error>> + Send + '_;

  /// Number of rows stored for `kind`.
  fn count(&self, kind: RecordKind) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn get_system(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<SolarSystem>, Self::Error>> + Send + '_;

  /// All systems ordered by id.
  fn list_systems(&self) -> impl Future<Output = Result<Vec<SolarSystem>, Self::Error>> + Send + '_;

  fn get_incident(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Incident>, Self::Error>> + Send + '_;

  /// Every stored system with its incident count (zero when none).
  fn system_activity(
    &self,
  ) -> impl Future<Output = Result<Vec<SystemActivity>, Self::Error>> + Send + '_;

  /// Most recent runs first.
  fn recent_runs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RunRecord>, Self::Error>> + Send + '_;
}
