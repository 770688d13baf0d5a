//! The Blue Alliance API v3 client: transport seam, conditional cache, and
//! typed endpoint wrappers.

pub mod client;
pub mod fetcher;
pub mod transport;
pub mod types;

pub use client::TbaClient;
