//! Push, notification-click and sync collaborators.
//!
//! These carry no caching policy. They turn platform events into the values
//! the host hands to its notification and window APIs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::NotificationConfig;

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub tag: String,
  pub require_interaction: bool,
  pub data: NotificationData,
  pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
  /// Page to open on click, relative to the origin
  pub url: String,
  /// Arrival time in milliseconds since the Unix epoch
  pub date_of_arrival: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
  title: Option<String>,
  body: Option<String>,
  tag: Option<String>,
  url: Option<String>,
  require_interaction: Option<bool>,
}

/// Build a notification from a push payload.
///
/// The payload is decoded as JSON. If that fails the raw text becomes the
/// body. Missing or empty fields take the configured defaults.
pub fn notification_from_push(payload: Option<&[u8]>, defaults: &NotificationConfig) -> Notification {
  let data = match payload {
    None => PushPayload::default(),
    Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|e| {
      debug!(error = %e, "Push payload is not JSON, using it as text");
      PushPayload {
        body: Some(String::from_utf8_lossy(bytes).into_owned()),
        ..Default::default()
      }
    }),
  };

  let or_default = |value: Option<String>, default: &str| {
    value
      .filter(|v| !v.is_empty())
      .unwrap_or_else(|| default.to_string())
  };

  let notification = Notification {
    title: or_default(data.title, &defaults.title),
    body: or_default(data.body, &defaults.body),
    icon: defaults.icon.clone(),
    badge: defaults.badge.clone(),
    vibrate: vec![200, 100, 200],
    tag: or_default(data.tag, &defaults.tag),
    require_interaction: data.require_interaction.unwrap_or(false),
    data: NotificationData {
      url: or_default(data.url, "/"),
      date_of_arrival: Utc::now().timestamp_millis(),
    },
    actions: vec![
      NotificationAction {
        action: "open".to_string(),
        title: "Open".to_string(),
      },
      NotificationAction {
        action: "close".to_string(),
        title: "Close".to_string(),
      },
    ],
  };

  info!(title = %notification.title, tag = %notification.tag, "Push received");
  notification
}

/// An open window client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
  pub id: String,
  pub url: String,
}

/// What the host should do after a notification click. The notification
/// itself is always closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
  /// The close action was chosen
  Dismissed,
  /// Focus this already-open client
  Focus(String),
  /// Open a new window at this URL
  OpenWindow(Url),
}

/// Resolve a notification click against the open clients.
pub fn handle_click(
  action: Option<&str>,
  target: Option<&str>,
  origin: &Url,
  clients: &[ClientWindow],
) -> ClickOutcome {
  debug!(action = ?action, "Notification clicked");

  if action == Some("close") {
    return ClickOutcome::Dismissed;
  }

  let target = target.filter(|t| !t.is_empty()).unwrap_or("/");
  let absolute = origin.join(target).unwrap_or_else(|_| origin.clone());

  match clients.iter().find(|c| c.url == absolute.as_str()) {
    Some(client) => ClickOutcome::Focus(client.id.clone()),
    None => ClickOutcome::OpenWindow(absolute),
  }
}

/// One-off or periodic background sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
  OneOff,
  Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Tag is known; acknowledged with nothing to do yet
  Handled,
  /// Tag is not registered; acknowledged and ignored
  Ignored,
}

pub const NOTIFICATION_SYNC_TAG: &str = "sync-notifications";
pub const CONTENT_SYNC_TAG: &str = "content-sync";

pub fn handle_sync(kind: SyncKind, tag: &str) -> SyncOutcome {
  info!(kind = ?kind, tag, "Background sync");
  match (kind, tag) {
    (SyncKind::OneOff, NOTIFICATION_SYNC_TAG) | (SyncKind::Periodic, CONTENT_SYNC_TAG) => {
      SyncOutcome::Handled
    }
    _ => SyncOutcome::Ignored,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn origin() -> Url {
    Url::parse("https://example.com").unwrap()
  }

  #[test]
  fn test_json_payload() {
    let payload = br#"{"title":"Grades","body":"New grade posted","url":"/grades","requireInteraction":true}"#;
    let n = notification_from_push(Some(payload), &NotificationConfig::default());

    assert_eq!(n.title, "Grades");
    assert_eq!(n.body, "New grade posted");
    assert_eq!(n.data.url, "/grades");
    assert!(n.require_interaction);
    assert_eq!(n.tag, "offline-proxy-notification");
    assert_eq!(n.vibrate, vec![200, 100, 200]);
    assert_eq!(n.actions.len(), 2);
  }

  #[test]
  fn test_text_payload_becomes_body() {
    let n = notification_from_push(Some(b"plain text ping"), &NotificationConfig::default());
    assert_eq!(n.title, "Notification");
    assert_eq!(n.body, "plain text ping");
    assert_eq!(n.data.url, "/");
  }

  #[test]
  fn test_empty_push_uses_defaults() {
    let defaults = NotificationConfig {
      title: "App".to_string(),
      ..Default::default()
    };
    let n = notification_from_push(None, &defaults);
    assert_eq!(n.title, "App");
    assert_eq!(n.body, defaults.body);
    assert!(!n.require_interaction);
  }

  #[test]
  fn test_serializes_camel_case() {
    let n = notification_from_push(None, &NotificationConfig::default());
    let json = serde_json::to_value(&n).unwrap();
    assert!(json.get("requireInteraction").is_some());
    assert!(json["data"].get("dateOfArrival").is_some());
  }

  #[test]
  fn test_click_close_dismisses() {
    let outcome = handle_click(Some("close"), Some("/x"), &origin(), &[]);
    assert_eq!(outcome, ClickOutcome::Dismissed);
  }

  #[test]
  fn test_click_focuses_exact_match() {
    let clients = vec![
      ClientWindow {
        id: "a".to_string(),
        url: "https://example.com/grades?tab=1".to_string(),
      },
      ClientWindow {
        id: "b".to_string(),
        url: "https://example.com/grades".to_string(),
      },
    ];
    let outcome = handle_click(Some("open"), Some("/grades"), &origin(), &clients);
    assert_eq!(outcome, ClickOutcome::Focus("b".to_string()));
  }

  #[test]
  fn test_click_opens_window_at_root_by_default() {
    let outcome = handle_click(None, None, &origin(), &[]);
    assert_eq!(
      outcome,
      ClickOutcome::OpenWindow(Url::parse("https://example.com/").unwrap())
    );
  }

  #[test]
  fn test_sync_tags() {
    assert_eq!(handle_sync(SyncKind::OneOff, "sync-notifications"), SyncOutcome::Handled);
    assert_eq!(handle_sync(SyncKind::Periodic, "content-sync"), SyncOutcome::Handled);
    assert_eq!(handle_sync(SyncKind::OneOff, "content-sync"), SyncOutcome::Ignored);
    assert_eq!(handle_sync(SyncKind::Periodic, "other"), SyncOutcome::Ignored);
  }
}
