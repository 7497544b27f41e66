//! Fetch strategies for intercepted requests.
//!
//! - Navigations go network first. A 200 is stored; any other status is
//!   passed through untouched. Only a network failure falls back, first to
//!   the cached copy and then to the offline page.
//! - Static resources are stale-while-revalidate. The network request starts
//!   immediately in a detached task that refreshes the cache on a 200. A
//!   cached copy is returned without waiting for it; without one the client
//!   waits, and an unreachable network becomes a synthetic 503.

use color_eyre::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::offline::OfflineFallback;
use crate::cache::{CacheStorage, CachedResponse, RequestKey, Served};
use crate::net::{Network, Request, Response};

/// Outcome of one background cache refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
  /// The refreshed response was written to the current generation
  Stored(RequestKey),
  /// The network answered with a status other than 200; nothing was written
  Skipped { key: RequestKey, status: u16 },
  /// The network could not be reached
  Failed(RequestKey),
  /// The network answered 200 but the write failed
  StoreFailed(RequestKey),
}

/// Executes the per-class caching strategies against the current generation.
pub struct FetchEngine<S, N> {
  storage: Arc<S>,
  network: Arc<N>,
  generation: String,
  offline: OfflineFallback,
  observer: Option<mpsc::UnboundedSender<RefreshEvent>>,
}

impl<S, N> FetchEngine<S, N>
where
  S: CacheStorage + 'static,
  N: Network,
{
  pub fn new(
    storage: Arc<S>,
    network: Arc<N>,
    generation: impl Into<String>,
    offline: OfflineFallback,
  ) -> Self {
    Self {
      storage,
      network,
      generation: generation.into(),
      offline,
      observer: None,
    }
  }

  /// Report every background refresh outcome on `tx`.
  pub fn with_refresh_observer(mut self, tx: mpsc::UnboundedSender<RefreshEvent>) -> Self {
    self.observer = Some(tx);
    self
  }

  /// Network first, falling back to cache and then to the offline page.
  pub async fn network_first(&self, request: &Request) -> Served {
    let key = RequestKey::get(&request.url);

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          // The store keeps its own copy; `response` goes to the client.
          if let Err(e) = self.storage.put(&self.generation, &key, &response) {
            warn!(key = %key, error = %e, "Failed to cache navigation response");
          }
        }
        Served::from_network(response)
      }
      Err(e) => {
        debug!(key = %key, error = %e, "Navigation failed, falling back to cache");
        match self.lookup(&key) {
          Some(cached) => Served::from_cache(cached),
          None => Served::offline(self.offline.lookup(self.storage.as_ref(), &self.generation)),
        }
      }
    }
  }

  /// Serve the cached copy immediately while refreshing it in the background.
  pub async fn stale_while_revalidate(&self, request: &Request) -> Served {
    let key = RequestKey::get(&request.url);

    let refresh = tokio::spawn(revalidate(
      Arc::clone(&self.storage),
      self.network.fetch(request),
      self.generation.clone(),
      key.clone(),
      self.observer.clone(),
    ));

    if let Some(cached) = self.lookup(&key) {
      debug!(key = %key, "Serving cached copy, refresh in background");
      return Served::from_cache(cached);
    }

    match refresh.await {
      Ok(Some(response)) => Served::from_network(response),
      Ok(None) => Served::synthetic(Response::service_unavailable()),
      Err(e) => {
        warn!(key = %key, error = %e, "Refresh task aborted");
        Served::synthetic(Response::service_unavailable())
      }
    }
  }

  /// Cache lookup where a storage error counts as a miss.
  fn lookup(&self, key: &RequestKey) -> Option<CachedResponse> {
    match self.storage.match_request(&self.generation, key) {
      Ok(cached) => cached,
      Err(e) => {
        warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
        None
      }
    }
  }
}

/// Background half of stale-while-revalidate. Returns the network response
/// (any status) or `None` if the network could not be reached.
async fn revalidate<S: CacheStorage>(
  storage: Arc<S>,
  fetch: BoxFuture<'static, Result<Response>>,
  generation: String,
  key: RequestKey,
  observer: Option<mpsc::UnboundedSender<RefreshEvent>>,
) -> Option<Response> {
  let (event, response) = match fetch.await {
    Ok(response) if response.status == 200 => match storage.put(&generation, &key, &response) {
      Ok(()) => {
        debug!(key = %key, "Refreshed cache entry");
        (RefreshEvent::Stored(key), Some(response))
      }
      Err(e) => {
        warn!(key = %key, error = %e, "Failed to store refreshed response");
        (RefreshEvent::StoreFailed(key), Some(response))
      }
    },
    Ok(response) => {
      let status = response.status;
      (RefreshEvent::Skipped { key, status }, Some(response))
    }
    Err(e) => {
      debug!(key = %key, error = %e, "Background refresh failed");
      (RefreshEvent::Failed(key), None)
    }
  };

  if let Some(tx) = observer {
    // Ignore send errors - the observer may have gone away
    let _ = tx.send(event);
  }

  response
}
