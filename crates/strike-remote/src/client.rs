//! Async HTTP client for one remote collection.

use std::time::Duration;

use reqwest::Client;
use strike_core::{
  RawRecord,
  source::{CollectionSource, DetailSource, FetchedCollection},
};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result, page::CollectionBody};

/// Connection settings for one remote collection.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
  /// API root, e.g. `https://world-api-stillness.live.tech.evefrontier.com/v2`.
  pub base_url:  String,
  /// Collection path under the root, e.g. `solarsystems`.
  pub path:      String,
  /// `limit` sent with every page request.
  pub page_size: usize,
  /// `false` for feeds served as one unpaginated response.
  pub paginated: bool,
  /// Stop (incomplete) after this many page requests.
  pub max_pages: Option<usize>,
  pub timeout:   Duration,
}

/// HTTP access to one remote collection and its per-entity detail endpoint.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpCatalog {
  client: Client,
  config: RemoteConfig,
  cancel: CancellationToken,
}

impl HttpCatalog {
  pub fn new(config: RemoteConfig) -> Result<Self> {
    if config.page_size == 0 {
      return Err(Error::Config("page_size must be at least 1".into()));
    }
    if config.base_url.is_empty() {
      return Err(Error::Config("base_url is empty".into()));
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config, cancel: CancellationToken::new() })
  }

  /// Stop walking pages once `cancel` fires. The walk returns what it has,
  /// marked incomplete; a page request already in flight finishes first.
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  fn collection_url(&self) -> String {
    format!(
      "{}/{}",
      self.config.base_url.trim_end_matches('/'),
      self.config.path.trim_matches('/')
    )
  }

  fn detail_url(&self, id: i64) -> String { format!("{}/{id}", self.collection_url()) }

  async fn get_collection(&self, req: reqwest::RequestBuilder, url: &str) -> Result<Vec<RawRecord>> {
    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url: url.to_owned(), status: resp.status() });
    }
    let body: CollectionBody = resp.json().await.map_err(|e| Error::Body {
      url:    url.to_owned(),
      reason: e.to_string(),
    })?;
    Ok(body.into_records())
  }

  /// `GET {base}/{path}?limit={page_size}&offset={offset}`
  pub async fn fetch_page(&self, offset: usize) -> Result<Vec<RawRecord>> {
    let url = self.collection_url();
    let req = self
      .client
      .get(&url)
      .query(&[("limit", self.config.page_size), ("offset", offset)]);
    self.get_collection(req, &url).await
  }

  /// `GET {base}/{path}` for collections served in one response.
  pub async fn fetch_unpaged(&self) -> Result<Vec<RawRecord>> {
    let url = self.collection_url();
    self.get_collection(self.client.get(&url), &url).await
  }

  /// `GET {base}/{path}/{id}`
  pub async fn get_detail(&self, id: i64) -> Result<RawRecord> {
    let url = self.detail_url(id);
    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url, status: resp.status() });
    }
    let record: RawRecord = resp.json().await.map_err(|e| Error::Body {
      url:    url.clone(),
      reason: e.to_string(),
    })?;
    if !record.is_object() {
      return Err(Error::Body { url, reason: "expected a JSON object".into() });
    }
    Ok(record)
  }

  /// Walk pages until one comes back empty. Any failure ends the walk and
  /// keeps what was gathered so far.
  async fn walk_pages(&self) -> FetchedCollection {
    let mut fetched = FetchedCollection::default();
    let mut offset = 0;

    loop {
      if self.cancel.is_cancelled() {
        tracing::warn!(
          path = %self.config.path,
          pages = fetched.pages,
          "cancelled; collection incomplete"
        );
        return fetched;
      }
      if self.config.max_pages.is_some_and(|max| fetched.pages >= max) {
        tracing::warn!(
          path = %self.config.path,
          pages = fetched.pages,
          "page limit reached before an empty page; collection may be incomplete"
        );
        return fetched;
      }

      fetched.pages += 1;
      match self.fetch_page(offset).await {
        Ok(page) if page.is_empty() => {
          fetched.complete = true;
          return fetched;
        }
        Ok(page) => {
          offset += self.config.page_size;
          fetched.records.extend(page);
          tracing::debug!(
            path = %self.config.path,
            fetched = fetched.records.len(),
            "fetched page"
          );
        }
        Err(e) => {
          tracing::warn!(path = %self.config.path, offset, error = %e, "failed to fetch page");
          return fetched;
        }
      }
    }
  }
}

// ─── Source impls ────────────────────────────────────────────────────────────

impl CollectionSource for HttpCatalog {
  async fn fetch_all(&self) -> FetchedCollection {
    if self.config.paginated {
      return self.walk_pages().await;
    }
    if self.cancel.is_cancelled() {
      return FetchedCollection::default();
    }

    match self.fetch_unpaged().await {
      Ok(records) => FetchedCollection { records, pages: 1, complete: true },
      Err(e) => {
        tracing::warn!(path = %self.config.path, error = %e, "failed to fetch collection");
        FetchedCollection { records: Vec::new(), pages: 1, complete: false }
      }
    }
  }
}

impl DetailSource for HttpCatalog {
  async fn fetch_detail(&self, id: i64) -> Option<RawRecord> {
    match self.get_detail(id).await {
      Ok(record) => Some(record),
      Err(e) => {
        tracing::warn!(id, error = %e, "no detail available");
        None
      }
    }
  }
}
