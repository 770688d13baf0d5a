//! HTTP transport seam for the TBA client.
//!
//! The fetcher talks to upstream through the [`Transport`] trait so tests
//! can script responses without a network.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, ETAG, IF_NONE_MATCH};

use crate::error::FetchError;

/// The slice of an upstream response the caching layer cares about.
#[derive(Debug, Clone)]
pub struct RawResponse {
  pub status: u16,
  pub etag: Option<String>,
  /// Parsed `max-age` from the `Cache-Control` header, if present.
  pub max_age: Option<u64>,
  pub body: Vec<u8>,
}

/// A GET-only HTTP client, optionally conditional on a validator.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Issue a GET for `url`, attaching `If-None-Match: etag` when given.
  async fn get(&self, url: &str, etag: Option<&str>) -> Result<RawResponse, FetchError>;
}

/// reqwest-backed transport that carries the fixed TBA auth header on every
/// request.
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(api_key: &str) -> Result<Self, FetchError> {
    let mut auth = HeaderValue::from_str(api_key)
      .map_err(|e| FetchError::Transport(Box::new(e)))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("X-TBA-AUTH-KEY", auth);

    let client = reqwest::Client::builder()
      .user_agent(concat!("pitbot/", env!("CARGO_PKG_VERSION")))
      .default_headers(headers)
      .build()?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, url: &str, etag: Option<&str>) -> Result<RawResponse, FetchError> {
    let mut request = self.client.get(url);
    if let Some(tag) = etag {
      request = request.header(IF_NONE_MATCH, tag);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let etag = response
      .headers()
      .get(ETAG)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let max_age = response
      .headers()
      .get(CACHE_CONTROL)
      .and_then(|v| v.to_str().ok())
      .and_then(parse_max_age);
    let body = response.bytes().await?.to_vec();

    Ok(RawResponse {
      status,
      etag,
      max_age,
      body,
    })
  }
}

/// Extract the `max-age` directive from a `Cache-Control` header value.
fn parse_max_age(value: &str) -> Option<u64> {
  value.split(',').find_map(|directive| {
    directive
      .trim()
      .to_ascii_lowercase()
      .strip_prefix("max-age=")?
      .parse()
      .ok()
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_max_age_among_other_directives() {
    assert_eq!(parse_max_age("max-age=61"), Some(61));
    assert_eq!(parse_max_age("private, max-age=300, must-revalidate"), Some(300));
    assert_eq!(parse_max_age("Max-Age=10"), Some(10));
    assert_eq!(parse_max_age("no-store"), None);
    assert_eq!(parse_max_age("max-age=soon"), None);
  }
}
