//! Generational response cache.
//!
//! This module provides the persistent store behind the worker:
//! - Responses are grouped in named generations (one per worker version)
//! - Entries are keyed by request identity (GET + absolute URL)
//! - Whole generations are dropped when a newer worker activates

#[cfg(test)]
pub mod flaky;
mod storage;
mod types;

pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use types::{CachedResponse, EntrySummary, RequestKey, ResponseSource, Served};
