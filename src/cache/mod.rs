//! Persistent response cache keyed by request URL.
//!
//! The store only knows about opaque bodies, validators and freshness
//! timestamps; the revalidation protocol lives in [`crate::tba::fetcher`].

mod store;

pub use store::{CacheEntry, CacheStore, MemoryStore, SqliteStore, StoreError};
