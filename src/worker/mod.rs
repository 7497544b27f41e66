//! The network-proxy worker.
//!
//! A [`Worker`] receives platform events and answers each with a typed
//! [`Outcome`]:
//!
//! ```text
//! Event::Install ──────────────► Lifecycle::install   (precache + offline page)
//! Event::Activate ─────────────► Lifecycle::activate  (drop stale generations)
//! Event::Fetch(request) ─► classify ─┬─ NonCacheable ─► Passthrough
//!                                    ├─ Navigation ───► FetchEngine::network_first
//!                                    └─ Static ───────► FetchEngine::stale_while_revalidate
//! Event::Push / NotificationClick / Sync ─► notify::*
//! ```

mod classifier;
mod lifecycle;
mod notify;
mod offline;
mod strategy;

pub use classifier::{classify, RequestClass};
pub use lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerState};
pub use notify::{ClickOutcome, ClientWindow, Notification, SyncKind, SyncOutcome};
pub use offline::OfflineFallback;
pub use strategy::{FetchEngine, RefreshEvent};

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::cache::{CacheStorage, Served};
use crate::config::{Config, NotificationConfig};
use crate::net::{Network, Request};

/// Platform events the worker reacts to.
#[derive(Debug, Clone)]
pub enum Event {
  Install,
  Activate,
  Fetch(Request),
  Push(Option<Vec<u8>>),
  NotificationClick {
    action: Option<String>,
    url: Option<String>,
    clients: Vec<ClientWindow>,
  },
  Sync {
    kind: SyncKind,
    tag: String,
  },
}

impl Event {
  /// Event tag, as the platform names it.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::Install => "install",
      Self::Activate => "activate",
      Self::Fetch(_) => "fetch",
      Self::Push(_) => "push",
      Self::NotificationClick { .. } => "notificationclick",
      Self::Sync {
        kind: SyncKind::OneOff,
        ..
      } => "sync",
      Self::Sync {
        kind: SyncKind::Periodic,
        ..
      } => "periodicsync",
    }
  }
}

/// Result of handling a fetch event.
#[derive(Debug, Clone)]
pub enum Interception {
  /// Not intercepted; the host sends the request to the network itself
  Passthrough,
  /// The worker's answer
  Respond(Served),
}

/// Result of dispatching one event.
#[derive(Debug, Clone)]
pub enum Outcome {
  Installed(InstallReport),
  Activated(ActivateReport),
  Fetched(Interception),
  Notify(Notification),
  Click(ClickOutcome),
  Synced(SyncOutcome),
}

/// The worker for one origin.
pub struct Worker<S, N> {
  origin: Url,
  lifecycle: Lifecycle<S, N>,
  engine: FetchEngine<S, N>,
  notifications: NotificationConfig,
}

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Network,
{
  pub fn new(config: &Config, storage: Arc<S>, network: Arc<N>) -> Result<Self> {
    let offline = OfflineFallback::new(&config.origin, config.offline_document()?)?;
    let manifest = config.precache_urls()?;

    let lifecycle = Lifecycle::new(
      Arc::clone(&storage),
      Arc::clone(&network),
      config.generation.clone(),
      manifest,
      offline.clone(),
    );
    let engine = FetchEngine::new(storage, network, config.generation.clone(), offline);

    Ok(Self {
      origin: config.origin.clone(),
      lifecycle,
      engine,
      notifications: config.notifications.clone(),
    })
  }

  /// Report background cache refreshes on `tx`.
  pub fn with_refresh_observer(mut self, tx: mpsc::UnboundedSender<RefreshEvent>) -> Self {
    self.engine = self.engine.with_refresh_observer(tx);
    self
  }

  pub fn state(&self) -> WorkerState {
    self.lifecycle.state()
  }

  /// Whether the worker answers this request at all. Decided synchronously.
  pub fn intercepts(&self, request: &Request) -> bool {
    classify(request) != RequestClass::NonCacheable
  }

  /// Route an event to its handler.
  ///
  /// Only install and activate can fail. Fetch always produces a response
  /// or a passthrough.
  pub async fn dispatch(&self, event: Event) -> Result<Outcome> {
    debug!(event = event.tag(), "Dispatching");

    let outcome = match event {
      Event::Install => Outcome::Installed(self.lifecycle.install().await?),
      Event::Activate => Outcome::Activated(self.lifecycle.activate().await?),
      Event::Fetch(request) => Outcome::Fetched(self.handle_fetch(&request).await),
      Event::Push(payload) => Outcome::Notify(notify::notification_from_push(
        payload.as_deref(),
        &self.notifications,
      )),
      Event::NotificationClick {
        action,
        url,
        clients,
      } => Outcome::Click(notify::handle_click(
        action.as_deref(),
        url.as_deref(),
        &self.origin,
        &clients,
      )),
      Event::Sync { kind, tag } => Outcome::Synced(notify::handle_sync(kind, &tag)),
    };

    Ok(outcome)
  }

  /// Classify a request and run the matching strategy.
  pub async fn handle_fetch(&self, request: &Request) -> Interception {
    match classify(request) {
      RequestClass::NonCacheable => Interception::Passthrough,
      RequestClass::Navigation => Interception::Respond(self.engine.network_first(request).await),
      RequestClass::Static => {
        Interception::Respond(self.engine.stale_while_revalidate(request).await)
      }
    }
  }
}
