//! Storage fake with injectable failures, for tests.

use color_eyre::{eyre::eyre, Result};

use super::storage::{CacheStorage, MemoryStorage};
use super::types::{CachedResponse, EntrySummary, RequestKey};
use crate::net::Response;

/// Memory storage whose writes, reads or selected deletes fail.
#[derive(Default)]
pub struct FlakyStorage {
  pub inner: MemoryStorage,
  pub fail_put: bool,
  pub fail_match: bool,
  pub fail_delete: Vec<String>,
}

impl FlakyStorage {
  pub fn failing_puts() -> Self {
    Self {
      fail_put: true,
      ..Default::default()
    }
  }

  pub fn failing_matches() -> Self {
    Self {
      fail_match: true,
      ..Default::default()
    }
  }
}

impl CacheStorage for FlakyStorage {
  fn open_generation(&self, generation: &str) -> Result<()> {
    self.inner.open_generation(generation)
  }

  fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
    if self.fail_put {
      return Err(eyre!("disk full"));
    }
    self.inner.put(generation, key, response)
  }

  fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    if self.fail_match {
      return Err(eyre!("database is corrupt"));
    }
    self.inner.match_request(generation, key)
  }

  fn generations(&self) -> Result<Vec<String>> {
    self.inner.generations()
  }

  fn delete(&self, generation: &str) -> Result<bool> {
    if self.fail_delete.iter().any(|g| g == generation) {
      return Err(eyre!("locked"));
    }
    self.inner.delete(generation)
  }

  fn entries(&self, generation: &str) -> Result<Vec<EntrySummary>> {
    self.inner.entries(generation)
  }
}
