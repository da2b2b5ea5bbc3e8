//! `strike`: mirror the remote solar-system catalog and incident feed into a
//! local SQLite database.
//!
//! # Usage
//!
//! ```
//! strike sync systems
//! strike --config ~/.config/strike/strike.toml sync all
//! STRIKE_PAGE_SIZE=500 strike --store /tmp/strike.db sync incidents
//! strike activity > activity.json
//! strike runs --limit 5
//! ```
//!
//! Settings come from the TOML file, then `STRIKE_*` environment variables
//! (nested keys joined with `__`, e.g. `STRIKE_SYSTEMS__DETAIL=false`), then
//! the command-line flags.

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use strike_core::{Incident, RecordKind, SolarSystem, run::SyncReport, store::CatalogStore};
use strike_remote::{HttpCatalog, RemoteConfig};
use strike_store_sqlite::{SqliteStore, StoreOptions};
use strike_sync::{SyncConfig, SyncOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "strike", author, version, about = "Catalog and incident synchronizer")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "strike.toml")]
  config: PathBuf,

  /// API root for collections without their own `base_url`.
  #[arg(long, value_name = "URL")]
  base_url: Option<String>,

  /// SQLite database file.
  #[arg(long, value_name = "PATH")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Fetch a collection and upsert it into the store.
  Sync {
    #[arg(value_enum)]
    target: SyncTarget,
  },
  /// Print every stored system with its incident count as JSON.
  Activity,
  /// Print the most recent sync runs as JSON.
  Runs {
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum SyncTarget {
  Systems,
  Incidents,
  /// Systems, then incidents if the systems run finished.
  All,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli)?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path, StoreOptions {
    tables:       cfg.tables.clone(),
    foreign_keys: !cfg.relax_incident_fk,
  })
  .await
  .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Sync { target } => sync(&cfg, &store, target).await,
    Command::Activity => {
      let activity = store.system_activity().await.context("failed to read activity")?;
      print_json(&activity)?;
      Ok(ExitCode::SUCCESS)
    }
    Command::Runs { limit } => {
      let runs = store.recent_runs(limit).await.context("failed to read run log")?;
      print_json(&runs)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
  let mut cfg = resolve_config(
    config::File::from(cli.config.clone()).required(false),
    environment(),
  )?;

  if let Some(base_url) = &cli.base_url {
    cfg.base_url = base_url.clone();
  }
  if let Some(store) = &cli.store {
    cfg.store_path = store.clone();
  }
  cfg.validate().context("invalid configuration")?;
  Ok(cfg)
}

/// `STRIKE_PAGE_SIZE=500`, `STRIKE_SYSTEMS__DETAIL=false`, ...
fn environment() -> config::Environment {
  config::Environment::with_prefix("STRIKE")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

/// Layer `file` and `env` over the built-in defaults, key by key, so a
/// source may set a single field of a section.
fn resolve_config(
  file: impl config::Source + Send + Sync + 'static,
  env: config::Environment,
) -> anyhow::Result<SyncConfig> {
  let defaults =
    config::Config::try_from(&SyncConfig::default()).context("failed to encode default config")?;

  config::Config::builder()
    .add_source(defaults)
    .add_source(file)
    .add_source(env)
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise SyncConfig")
}

// ─── Sync ─────────────────────────────────────────────────────────────────────

async fn sync(cfg: &SyncConfig, store: &SqliteStore, target: SyncTarget) -> anyhow::Result<ExitCode> {
  let cancel = CancellationToken::new();
  spawn_interrupt_handler(cancel.clone());

  let kinds: &[RecordKind] = match target {
    SyncTarget::Systems => &[RecordKind::Systems],
    SyncTarget::Incidents => &[RecordKind::Incidents],
    SyncTarget::All => &[RecordKind::Systems, RecordKind::Incidents],
  };

  let mut reports = Vec::with_capacity(kinds.len());
  for &kind in kinds {
    if let Some(prev) = reports.last().map(|r: &SyncReport| r.status)
      && !prev.is_done()
    {
      tracing::warn!(%kind, previous = %prev, "skipping collection after unfinished run");
      break;
    }
    reports.push(sync_one(cfg, store, kind, &cancel).await?);
  }

  print_json(&reports)?;
  let all_done = reports.len() == kinds.len() && reports.iter().all(|r| r.status.is_done());
  Ok(if all_done { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn sync_one(
  cfg: &SyncConfig,
  store: &SqliteStore,
  kind: RecordKind,
  cancel: &CancellationToken,
) -> anyhow::Result<SyncReport> {
  let collection = cfg.collection(kind);
  let remote = HttpCatalog::new(RemoteConfig {
    base_url:  cfg.base_url_for(kind).to_owned(),
    path:      collection.path.clone(),
    page_size: cfg.page_size,
    paginated: collection.paginated,
    max_pages: cfg.max_pages,
    timeout:   cfg.request_timeout(),
  })
  .with_context(|| format!("failed to build client for {kind}"))?
  .with_cancellation(cancel.clone());

  let orchestrator = SyncOrchestrator::new(store, &remote, cfg).with_cancellation(cancel.clone());
  Ok(match kind {
    RecordKind::Systems => orchestrator.run::<SolarSystem>().await,
    RecordKind::Incidents => orchestrator.run::<Incident>().await,
  })
}

/// The first Ctrl-C cancels the run after the current request; the second
/// exits at once.
fn spawn_interrupt_handler(cancel: CancellationToken) {
  tokio::spawn(async move {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::warn!(error = %e, "failed to listen for Ctrl-C");
      return;
    }
    tracing::warn!("interrupt received; stopping after the current request (Ctrl-C again to quit)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("second interrupt; exiting");
      std::process::exit(130);
    }
  });
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("failed to encode output")?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
