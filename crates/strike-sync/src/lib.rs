//! The synchronization engine.
//!
//! A run fetches a whole remote collection, bulk-loads it, then enriches
//! each entity with its detail record, one paced request at a time. See
//! [`SyncOrchestrator`] for the state machine and [`UpsertWriter`] for how
//! raw records become rows.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pacer;
pub mod writer;

pub use config::{CollectionConfig, SyncConfig};
pub use error::{Error, Result};
pub use orchestrator::{Phase, SyncOrchestrator, SyncRun};
pub use pacer::Pacer;
pub use writer::{BatchOutcome, UpsertOutcome, UpsertWriter};

#[cfg(test)]
mod tests;
