//! Core types and trait definitions for the Strike catalog synchronizer.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Remote sources and storage backends implement the traits defined here;
//! the sync engine depends only on those abstractions.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod incident;
pub mod record;
pub mod run;
pub mod source;
pub mod store;
pub mod system;

pub use error::{Error, Result, ValidationError};
pub use incident::Incident;
pub use record::{CatalogRecord, ColumnValue, RawRecord, RecordKind};
pub use system::{Coordinates, SolarSystem};
