//! Install and activate phases of the worker.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use super::offline::OfflineFallback;
use crate::cache::{CacheStorage, RequestKey};
use crate::net::{Network, Request};

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
  /// Created, nothing run yet
  #[default]
  Parsed,
  Installing,
  /// Installed; ready to take over immediately
  Installed,
  Activating,
  /// Active and controlling clients
  Activated,
  /// Install failed; this worker will never activate
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

/// What install did.
#[derive(Debug, Clone)]
pub struct InstallReport {
  pub generation: String,
  /// Manifest entries now in the cache
  pub precached: Vec<Url>,
  /// Manifest entries that could not be cached, with the reason
  pub skipped: Vec<(Url, String)>,
  /// Take over from the previous worker without waiting for clients to close
  pub skip_waiting: bool,
}

/// What activate did.
#[derive(Debug, Clone)]
pub struct ActivateReport {
  /// Stale generations that were removed
  pub deleted: Vec<String>,
  /// Stale generations whose removal failed, with the reason
  pub failed: Vec<(String, String)>,
  /// Take control of all open clients now
  pub claim_clients: bool,
}

/// Drives install-time population and activate-time cleanup.
pub struct Lifecycle<S, N> {
  storage: Arc<S>,
  network: Arc<N>,
  generation: String,
  manifest: Vec<Url>,
  offline: OfflineFallback,
  state: Mutex<WorkerState>,
}

impl<S, N> Lifecycle<S, N>
where
  S: CacheStorage,
  N: Network,
{
  pub fn new(
    storage: Arc<S>,
    network: Arc<N>,
    generation: impl Into<String>,
    manifest: Vec<Url>,
    offline: OfflineFallback,
  ) -> Self {
    Self {
      storage,
      network,
      generation: generation.into(),
      manifest,
      offline,
      state: Mutex::new(WorkerState::Parsed),
    }
  }

  pub fn state(&self) -> WorkerState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(WorkerState::Redundant)
  }

  fn set_state(&self, state: WorkerState) {
    if let Ok(mut current) = self.state.lock() {
      let from = *current;
      debug!(%from, to = %state, "Worker state change");
      *current = state;
    }
  }

  /// Open the current generation, store the offline page and populate the
  /// manifest.
  ///
  /// Manifest entries are fetched concurrently and each one is best effort.
  /// Failing to store the offline page is the only fatal error.
  pub async fn install(&self) -> Result<InstallReport> {
    match self.state() {
      WorkerState::Parsed | WorkerState::Installed => {}
      state => return Err(eyre!("Cannot install worker in state {}", state)),
    }

    info!(generation = %self.generation, "Installing");
    self.set_state(WorkerState::Installing);

    let installed = self
      .storage
      .open_generation(&self.generation)
      .and_then(|()| self.offline.install(self.storage.as_ref(), &self.generation));

    if let Err(e) = installed {
      error!(generation = %self.generation, error = %e, "Install failed");
      self.set_state(WorkerState::Redundant);
      return Err(e);
    }
    debug!(key = %self.offline.key(), "Stored offline page");

    let fetches = self.manifest.iter().map(|url| {
      let request = Request::get(url.clone()).with_header("Cache-Control", "no-cache");
      let fetch = self.network.fetch(&request);
      async move { (url, fetch.await) }
    });

    let mut precached = Vec::new();
    let mut skipped = Vec::new();

    for (url, result) in join_all(fetches).await {
      let reason = match result {
        Ok(response) if response.is_ok() => {
          match self
            .storage
            .put(&self.generation, &RequestKey::get(url), &response)
          {
            Ok(()) => {
              precached.push(url.clone());
              continue;
            }
            Err(e) => format!("store failed: {}", e),
          }
        }
        Ok(response) => format!("status {}", response.status),
        Err(e) => e.to_string(),
      };

      warn!(url = %url, reason = %reason, "Failed to precache");
      skipped.push((url.clone(), reason));
    }

    info!(
      generation = %self.generation,
      precached = precached.len(),
      skipped = skipped.len(),
      "Installed"
    );
    self.set_state(WorkerState::Installed);

    Ok(InstallReport {
      generation: self.generation.clone(),
      precached,
      skipped,
      skip_waiting: true,
    })
  }

  /// Delete every generation except the current one, then claim clients.
  ///
  /// A worker that was installed by an earlier process (its generation is
  /// already in storage) may activate without installing again.
  pub async fn activate(&self) -> Result<ActivateReport> {
    let generations = self.storage.generations()?;

    match self.state() {
      WorkerState::Installed | WorkerState::Activated => {}
      WorkerState::Parsed if generations.contains(&self.generation) => {}
      state => {
        return Err(eyre!(
          "Cannot activate worker in state {} (generation {} not installed)",
          state,
          self.generation
        ))
      }
    }

    info!(generation = %self.generation, "Activating");
    self.set_state(WorkerState::Activating);

    let mut deleted = Vec::new();
    let mut failed = Vec::new();

    for name in generations.into_iter().filter(|n| *n != self.generation) {
      match self.storage.delete(&name) {
        Ok(_) => {
          info!(generation = %name, "Deleted old cache");
          deleted.push(name);
        }
        Err(e) => {
          warn!(generation = %name, error = %e, "Failed to delete old cache");
          failed.push((name, e.to_string()));
        }
      }
    }

    self.set_state(WorkerState::Activated);

    Ok(ActivateReport {
      deleted,
      failed,
      claim_clients: true,
    })
  }
}
