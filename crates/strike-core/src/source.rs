//! Remote source traits.
//!
//! Both traits absorb transport failures: a collection fetch returns whatever
//! it managed to accumulate, and a detail fetch returns `None`. Neither can
//! halt a sync run.

use std::future::Future;

use crate::RawRecord;

/// The result of walking a remote collection.
#[derive(Debug, Clone, Default)]
pub struct FetchedCollection {
  pub records:  Vec<RawRecord>,
  /// Requests issued, including the one that returned the empty page.
  pub pages:    usize,
  /// `false` when the walk stopped early on an error or a page cap.
  pub complete: bool,
}

impl FetchedCollection {
  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

/// Bulk retrieval of a whole collection.
pub trait CollectionSource: Send + Sync {
  fn fetch_all(&self) -> impl Future<Output = FetchedCollection> + Send + '_;
}

/// Per-entity enrichment lookups.
pub trait DetailSource: Send + Sync {
  /// Fetch the detail record for `id`; `None` on any failure.
  fn fetch_detail(&self, id: i64) -> impl Future<Output = Option<RawRecord>> + Send + '_;
}
