//! Conditional-caching fetch layer.
//!
//! Every response body is kept in a URL-keyed persistent store together with
//! its `ETag` validator and freshness window. A fetch serves fresh entries
//! straight from the store; stale or missing entries are revalidated with
//! `If-None-Match`, and a 304 restores the stored body instead of moving it
//! over the wire again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::transport::Transport;
use crate::cache::{CacheEntry, CacheStore};
use crate::error::FetchError;

/// Caching HTTP client for a single API base URL.
///
/// Concurrent fetches of the same URL are not mutually excluded; both may
/// race to update the store and the validator index, and the last write
/// wins. That is sound here because every later read revalidates against
/// upstream anyway.
pub struct CachingFetcher {
  base_url: String,
  transport: Arc<dyn Transport>,
  store: Arc<dyn CacheStore>,
  /// Last validator seen per URL, consulted before every request.
  etags: Mutex<HashMap<String, String>>,
}

impl CachingFetcher {
  pub fn new(
    base_url: impl Into<String>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
  ) -> Self {
    Self {
      base_url: base_url.into(),
      transport,
      store,
      etags: Mutex::new(HashMap::new()),
    }
  }

  /// Fetch the JSON body for `path` relative to the API base.
  ///
  /// A cache inconsistency (upstream said "unchanged" but no body survived
  /// locally) is recovered once: the stale validator is dropped and the
  /// request reissued unconditionally. A second occurrence surfaces the
  /// error; any further retry policy belongs to the caller.
  pub async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
    match self.fetch_once(path).await {
      Err(FetchError::CacheInconsistency) => {
        warn!(path, "cached body missing on 304; refetching unconditionally");
        self.fetch_once(path).await
      }
      other => other,
    }
  }

  async fn fetch_once(&self, path: &str) -> Result<Value, FetchError> {
    let url = format!("{}{}", self.base_url, path);
    let validator = self.etag_for(&url);

    // Capture the current entry before sending anything: the store may
    // purge it by expiry mid-flight, and a 304 needs this body back.
    let captured = self.store.get(&url)?;

    if let Some(entry) = &captured {
      if entry.is_fresh_at(Utc::now()) {
        debug!(%url, "cache hit");
        return Ok(serde_json::from_slice(&entry.body)?);
      }
    }

    let response = self.transport.get(&url, validator.as_deref()).await?;

    match response.status {
      200 => {
        let body: Value = serde_json::from_slice(&response.body)?;
        let entry = CacheEntry {
          body: response.body,
          etag: response.etag.clone(),
          stored_at: Utc::now(),
          max_age: response.max_age,
        };
        self.store.put(&url, &entry)?;
        if let Some(tag) = response.etag {
          self.set_etag(&url, tag);
        }
        Ok(body)
      }
      304 => match captured {
        Some(entry) => {
          // The entry had gone stale but upstream confirmed it is still
          // current; re-store it with a fresh window.
          debug!(%url, "revalidated by 304");
          let refreshed = CacheEntry {
            stored_at: Utc::now(),
            max_age: response.max_age.or(entry.max_age),
            ..entry
          };
          self.store.put(&url, &refreshed)?;
          Ok(serde_json::from_slice(&refreshed.body)?)
        }
        None => {
          self.clear_etag(&url);
          Err(FetchError::CacheInconsistency)
        }
      },
      404 => Err(FetchError::NotFound),
      status => Err(FetchError::Upstream { status }),
    }
  }

  fn etag_for(&self, url: &str) -> Option<String> {
    self
      .etags
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(url)
      .cloned()
  }

  fn set_etag(&self, url: &str, tag: String) {
    self
      .etags
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(url.to_string(), tag);
  }

  fn clear_etag(&self, url: &str) {
    self
      .etags
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(url);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStore, StoreError};
  use crate::tba::transport::RawResponse;
  use async_trait::async_trait;
  use serde_json::json;
  use std::collections::VecDeque;

  /// Transport double that replays a script of responses and records the
  /// conditional header of every request it sees.
  #[derive(Default)]
  struct ScriptedTransport {
    script: Mutex<VecDeque<RawResponse>>,
    seen: Mutex<Vec<Option<String>>>,
  }

  impl ScriptedTransport {
    fn with(responses: Vec<RawResponse>) -> Arc<Self> {
      Arc::new(Self {
        script: Mutex::new(responses.into()),
        seen: Mutex::new(Vec::new()),
      })
    }

    fn validators_sent(&self) -> Vec<Option<String>> {
      self.seen.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Transport for ScriptedTransport {
    async fn get(&self, _url: &str, etag: Option<&str>) -> Result<RawResponse, FetchError> {
      self.seen.lock().unwrap().push(etag.map(String::from));
      self
        .script
        .lock()
        .unwrap()
        .pop_front()
        .ok_or(FetchError::Transport("script exhausted".into()))
    }
  }

  /// Store that never retains anything, so a 304 can find no body.
  struct NoopStore;

  impl CacheStore for NoopStore {
    fn get(&self, _url: &str) -> Result<Option<CacheEntry>, StoreError> {
      Ok(None)
    }

    fn put(&self, _url: &str, _entry: &CacheEntry) -> Result<(), StoreError> {
      Ok(())
    }
  }

  fn ok_response(body: &str, etag: &str, max_age: Option<u64>) -> RawResponse {
    RawResponse {
      status: 200,
      etag: Some(etag.to_string()),
      max_age,
      body: body.as_bytes().to_vec(),
    }
  }

  fn status_response(status: u16) -> RawResponse {
    RawResponse {
      status,
      etag: None,
      max_age: None,
      body: Vec::new(),
    }
  }

  fn fetcher(transport: Arc<ScriptedTransport>, store: Arc<dyn CacheStore>) -> CachingFetcher {
    CachingFetcher::new("https://api.test/v3", transport, store)
  }

  #[tokio::test]
  async fn first_fetch_is_unconditional_then_sends_validator() {
    let transport = ScriptedTransport::with(vec![
      ok_response("[1,2]", "\"tag-a\"", None),
      status_response(304),
    ]);
    let f = fetcher(Arc::clone(&transport), Arc::new(MemoryStore::new()));

    let first = f.fetch("/event/2023casj/matches/simple").await.unwrap();
    let second = f.fetch("/event/2023casj/matches/simple").await.unwrap();

    // Identical body whether the wire carried a 200 or a 304.
    assert_eq!(first, json!([1, 2]));
    assert_eq!(second, json!([1, 2]));
    assert_eq!(
      transport.validators_sent(),
      vec![None, Some("\"tag-a\"".to_string())]
    );
  }

  #[tokio::test]
  async fn serves_fresh_entries_without_touching_the_network() {
    let transport = ScriptedTransport::with(vec![ok_response("{\"a\":1}", "\"t\"", Some(300))]);
    let f = fetcher(Arc::clone(&transport), Arc::new(MemoryStore::new()));

    let first = f.fetch("/status").await.unwrap();
    let second = f.fetch("/status").await.unwrap();

    assert_eq!(first, second);
    // Only the initial request reached the transport.
    assert_eq!(transport.validators_sent().len(), 1);
  }

  #[tokio::test]
  async fn a_304_restores_the_captured_body_into_the_store() {
    let store = Arc::new(MemoryStore::new());
    let transport = ScriptedTransport::with(vec![
      ok_response("[7]", "\"t\"", None),
      status_response(304),
    ]);
    let f = fetcher(transport, Arc::clone(&store) as Arc<dyn CacheStore>);

    f.fetch("/teams").await.unwrap();
    let stored_before = store.get("https://api.test/v3/teams").unwrap().unwrap();

    let body = f.fetch("/teams").await.unwrap();
    assert_eq!(body, json!([7]));

    // Re-put with a refreshed timestamp, same body.
    let stored_after = store.get("https://api.test/v3/teams").unwrap().unwrap();
    assert_eq!(stored_after.body, stored_before.body);
    assert!(stored_after.stored_at >= stored_before.stored_at);
  }

  #[tokio::test]
  async fn missing_body_on_304_recovers_with_one_unconditional_refetch() {
    // The store retains nothing, so the second fetch revalidates, gets a
    // 304 and finds no captured body. Recovery drops the validator and the
    // follow-up request must be unconditional.
    let transport = ScriptedTransport::with(vec![
      ok_response("[1]", "\"t\"", None),
      status_response(304),
      ok_response("[2]", "\"t2\"", None),
    ]);
    let f = fetcher(Arc::clone(&transport), Arc::new(NoopStore));

    f.fetch("/districts").await.unwrap();
    let recovered = f.fetch("/districts").await.unwrap();

    assert_eq!(recovered, json!([2]));
    assert_eq!(
      transport.validators_sent(),
      vec![None, Some("\"t\"".to_string()), None]
    );
  }

  #[tokio::test]
  async fn recurring_inconsistency_is_surfaced() {
    let transport = ScriptedTransport::with(vec![
      ok_response("[1]", "\"t\"", None),
      status_response(304),
      status_response(304),
    ]);
    let f = fetcher(Arc::clone(&transport), Arc::new(NoopStore));

    f.fetch("/districts").await.unwrap();
    let err = f.fetch("/districts").await.unwrap_err();

    assert!(matches!(err, FetchError::CacheInconsistency));
    // The stale validator was cleared on the first failure, so the retry
    // went out unconditionally.
    assert_eq!(
      transport.validators_sent(),
      vec![None, Some("\"t\"".to_string()), None]
    );
  }

  #[tokio::test]
  async fn not_found_is_its_own_error_kind() {
    let transport = ScriptedTransport::with(vec![status_response(404)]);
    let f = fetcher(transport, Arc::new(MemoryStore::new()));

    let err = f.fetch("/team/frc0/events/2023").await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound));
  }

  #[tokio::test]
  async fn other_statuses_surface_as_upstream_errors() {
    let transport = ScriptedTransport::with(vec![status_response(503)]);
    let f = fetcher(transport, Arc::new(MemoryStore::new()));

    let err = f.fetch("/status").await.unwrap_err();
    assert!(matches!(err, FetchError::Upstream { status: 503 }));
  }

  #[tokio::test]
  async fn transport_failures_pass_through() {
    let transport = ScriptedTransport::with(vec![]);
    let f = fetcher(transport, Arc::new(MemoryStore::new()));

    let err = f.fetch("/status").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
  }
}
