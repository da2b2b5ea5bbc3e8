//! HTTP access to the remote catalog API.
//!
//! [`HttpCatalog`] walks a paginated collection endpoint and looks up single
//! entities by id. It implements the source traits from `strike-core`, which
//! absorb transport failures; the fallible per-request methods are public
//! for callers that want the error.

mod client;
mod page;

pub mod error;

pub use client::{HttpCatalog, RemoteConfig};
pub use error::{Error, Result};
