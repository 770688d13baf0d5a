//! Error taxonomies for the fetch layer and the pager.

use thiserror::Error;

use crate::cache::StoreError;

/// Errors surfaced by the caching fetch layer.
///
/// `fetch` never retries on its own, with one exception: a
/// [`FetchError::CacheInconsistency`] is recovered once by clearing the stale
/// validator and refetching unconditionally. If the inconsistency recurs it is
/// returned to the caller, who decides whether to retry anything else.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Upstream has no such resource.
  #[error("404 Not Found; check your parameters?")]
  NotFound,

  /// Upstream answered with a status other than 200/304/404.
  #[error("upstream API returned status {status}")]
  Upstream { status: u16 },

  /// Network-level failure before any status line was received.
  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The validator index said a cached body should exist but the store had
  /// nothing to revalidate on a 304.
  #[error("cache inconsistency: validator present but cached body missing")]
  CacheInconsistency,

  /// The persistent cache store failed.
  #[error("cache store: {0}")]
  Store(#[from] StoreError),

  /// The response body was not the JSON we expected.
  #[error("failed to decode API response: {0}")]
  Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    FetchError::Transport(Box::new(err))
  }
}

/// Errors surfaced by the pagination state machine.
#[derive(Debug, Error)]
pub enum PagerError {
  /// Constructed with zero pages or a start page outside `[0, page_count)`.
  #[error("invalid page range: start page {start} of {count} pages")]
  InvalidPageRange { start: usize, count: usize },

  /// The injected render function failed; the cursor did not move.
  #[error("failed to render page: {0}")]
  Render(#[source] Box<dyn std::error::Error + Send + Sync>),
}
