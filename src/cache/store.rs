//! Cache store trait and its SQLite and in-memory implementations.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors from the persistent cache store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not determine data directory")]
  NoDataDir,

  #[error("cache lock poisoned")]
  Poisoned,

  #[error("bad timestamp in cache row: {0}")]
  Timestamp(String),
}

/// One cached upstream response, keyed by its request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  /// Raw response body as received from upstream.
  pub body: Vec<u8>,
  /// Validator from the response `ETag` header, if any.
  pub etag: Option<String>,
  /// When this entry was (re-)stored.
  pub stored_at: DateTime<Utc>,
  /// Freshness lifetime in seconds, from the response `Cache-Control` max-age.
  /// `None` means the entry is always revalidated before use.
  pub max_age: Option<u64>,
}

impl CacheEntry {
  /// Whether the entry is still within its freshness window at `now`.
  pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
    match self.max_age {
      Some(secs) => now - self.stored_at < Duration::seconds(secs as i64),
      None => false,
    }
  }
}

/// Trait for cache storage backends.
///
/// Absence is reported distinctly (`Ok(None)`), never as an error or an empty
/// body. Eviction is the backend's business; callers must tolerate entries
/// disappearing between calls.
pub trait CacheStore: Send + Sync {
  /// Look up the entry for a URL.
  fn get(&self, url: &str) -> Result<Option<CacheEntry>, StoreError>;

  /// Insert or overwrite the entry for a URL.
  fn put(&self, url: &str, entry: &CacheEntry) -> Result<(), StoreError>;
}

/// In-memory store. Used in tests and for throwaway runs that should not
/// leave a database behind.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, url: &str) -> Result<Option<CacheEntry>, StoreError> {
    let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(entries.get(url).cloned())
  }

  fn put(&self, url: &str, entry: &CacheEntry) -> Result<(), StoreError> {
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
    entries.insert(url.to_string(), entry.clone());
    Ok(())
  }
}

/// SQLite-based cache store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Rows untouched for this long are dropped when the store is opened.
const PURGE_HORIZON_DAYS: i64 = 30;

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    url TEXT PRIMARY KEY,
    body BLOB NOT NULL,
    etag TEXT,
    max_age INTEGER,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at `path`, or at the default location under the user's
  /// data directory when `path` is `None`.
  pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(&path)?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    store.purge_old_rows()?;

    Ok(store)
  }

  fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StoreError::NoDataDir)?;

    Ok(data_dir.join("pitbot").join("api_cache.db"))
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }

  fn purge_old_rows(&self) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute(
      "DELETE FROM response_cache WHERE stored_at < datetime('now', ?)",
      params![format!("-{} days", PURGE_HORIZON_DAYS)],
    )?;
    Ok(())
  }
}

impl CacheStore for SqliteStore {
  fn get(&self, url: &str) -> Result<Option<CacheEntry>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

    let row: Option<(Vec<u8>, Option<String>, Option<u64>, String)> = conn
      .query_row(
        "SELECT body, etag, max_age, stored_at FROM response_cache WHERE url = ?",
        params![url],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    match row {
      Some((body, etag, max_age, stored_at)) => Ok(Some(CacheEntry {
        body,
        etag,
        stored_at: parse_datetime(&stored_at)?,
        max_age,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, url: &str, entry: &CacheEntry) -> Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

    conn.execute(
      "INSERT OR REPLACE INTO response_cache (url, body, etag, max_age, stored_at)
       VALUES (?, ?, ?, ?, ?)",
      params![
        url,
        entry.body,
        entry.etag,
        entry.max_age,
        entry.stored_at.format("%Y-%m-%d %H:%M:%S").to_string(),
      ],
    )?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|_| StoreError::Timestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(body: &str, max_age: Option<u64>) -> CacheEntry {
    CacheEntry {
      body: body.as_bytes().to_vec(),
      etag: Some("\"abc\"".to_string()),
      stored_at: Utc::now(),
      max_age,
    }
  }

  #[test]
  fn memory_store_reports_absence_distinctly() {
    let store = MemoryStore::new();
    assert!(store.get("https://example.test/a").unwrap().is_none());

    store.put("https://example.test/a", &entry("[]", None)).unwrap();
    let got = store.get("https://example.test/a").unwrap().unwrap();
    assert_eq!(got.body, b"[]");
    assert!(store.get("https://example.test/b").unwrap().is_none());
  }

  #[test]
  fn put_overwrites_existing_entry() {
    let store = MemoryStore::new();
    store.put("u", &entry("old", None)).unwrap();
    store.put("u", &entry("new", Some(60))).unwrap();

    let got = store.get("u").unwrap().unwrap();
    assert_eq!(got.body, b"new");
    assert_eq!(got.max_age, Some(60));
  }

  #[test]
  fn freshness_follows_max_age() {
    let now = Utc::now();
    let mut e = entry("x", Some(300));
    e.stored_at = now;
    assert!(e.is_fresh_at(now));
    assert!(!e.is_fresh_at(now + Duration::seconds(301)));

    // No max-age means always revalidate.
    let e = entry("x", None);
    assert!(!e.is_fresh_at(now));
  }

  #[test]
  fn sqlite_store_round_trips_entries() {
    let dir = std::env::temp_dir().join(format!("pitbot-test-{}", std::process::id()));
    let path = dir.join("cache.db");
    let store = SqliteStore::open(Some(&path)).unwrap();

    assert!(store.get("u").unwrap().is_none());
    store.put("u", &entry("{\"k\":1}", Some(61))).unwrap();

    let got = store.get("u").unwrap().unwrap();
    assert_eq!(got.body, b"{\"k\":1}");
    assert_eq!(got.etag.as_deref(), Some("\"abc\""));
    assert_eq!(got.max_age, Some(61));

    std::fs::remove_dir_all(&dir).ok();
  }
}
