//! The offline page served when a navigation cannot be satisfied.

use color_eyre::{eyre::eyre, Result};
use tracing::warn;
use url::Url;

use crate::cache::{CacheStorage, RequestKey};
use crate::net::Response;

/// Path of the offline page within the controlled origin.
pub const OFFLINE_PATH: &str = "/offline.html";

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Offline</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            background: #eef1f8;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }
        .container {
            background: white;
            border-radius: 16px;
            padding: 48px 32px;
            max-width: 480px;
            text-align: center;
            box-shadow: 0 12px 40px rgba(0, 0, 0, 0.15);
        }
        h1 { color: #333; font-size: 26px; margin-bottom: 12px; }
        p { color: #666; line-height: 1.7; margin-bottom: 28px; }
        button {
            background: #4f46e5;
            color: white;
            padding: 12px 32px;
            border: none;
            border-radius: 8px;
            font-size: 16px;
            cursor: pointer;
        }
        .hint { margin-top: 24px; color: #4f46e5; font-size: 14px; }
    </style>
</head>
<body>
    <div class="container">
        <h1>You are offline</h1>
        <p>This page needs a network connection.<br>Check your connection and try again.</p>
        <button onclick="location.reload()">Try again</button>
        <div class="hint">Pages you visited before may still be available offline.</div>
    </div>
</body>
</html>
"#;

/// Holds the offline document and knows where it lives in the cache.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
  key: RequestKey,
  document: String,
}

impl OfflineFallback {
  /// Build the fallback for `origin`, optionally replacing the built-in document.
  pub fn new(origin: &Url, document: Option<String>) -> Result<Self> {
    let url = origin
      .join(OFFLINE_PATH)
      .map_err(|e| eyre!("Failed to resolve offline page URL: {}", e))?;

    Ok(Self {
      key: RequestKey::get(&url),
      document: document.unwrap_or_else(|| OFFLINE_HTML.to_string()),
    })
  }

  pub fn key(&self) -> &RequestKey {
    &self.key
  }

  /// The artifact as a fresh response.
  pub fn response(&self) -> Response {
    Response::html(self.document.clone())
  }

  /// Write the artifact into `generation`. Needs no network.
  pub fn install<S: CacheStorage + ?Sized>(&self, storage: &S, generation: &str) -> Result<()> {
    storage
      .put(generation, &self.key, &self.response())
      .map_err(|e| eyre!("Failed to install offline page: {}", e))
  }

  /// Read the stored artifact. Never fails: if storage cannot produce it the
  /// built-in copy is served instead.
  pub fn lookup<S: CacheStorage + ?Sized>(&self, storage: &S, generation: &str) -> Response {
    match storage.match_request(generation, &self.key) {
      Ok(Some(cached)) => cached.response,
      Ok(None) => {
        warn!(generation, "Offline page missing from cache, serving built-in copy");
        self.response()
      }
      Err(e) => {
        warn!(generation, error = %e, "Failed to read offline page, serving built-in copy");
        self.response()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::flaky::FlakyStorage;
  use crate::cache::MemoryStorage;

  fn origin() -> Url {
    Url::parse("https://example.com/app/").unwrap()
  }

  #[test]
  fn test_key_is_origin_root_offline_html() {
    let fallback = OfflineFallback::new(&origin(), None).unwrap();
    assert_eq!(fallback.key().url, "https://example.com/offline.html");
    assert_eq!(fallback.key().method, "GET");
  }

  #[test]
  fn test_install_then_lookup() {
    let storage = MemoryStorage::new();
    let fallback = OfflineFallback::new(&origin(), None).unwrap();
    fallback.install(&storage, "v1").unwrap();

    let response = fallback.lookup(&storage, "v1");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert!(response.text().contains("You are offline"));
  }

  #[test]
  fn test_lookup_without_install_still_serves_document() {
    let storage = MemoryStorage::new();
    let fallback = OfflineFallback::new(&origin(), Some("<p>custom</p>".to_string())).unwrap();

    let response = fallback.lookup(&storage, "v1");
    assert_eq!(response.text(), "<p>custom</p>");
    assert!(response.is_ok());
  }

  #[test]
  fn test_lookup_with_unreadable_storage_serves_builtin_copy() {
    let storage = FlakyStorage::failing_matches();
    let fallback = OfflineFallback::new(&origin(), None).unwrap();
    fallback.install(&storage, "v1").unwrap();

    let response = fallback.lookup(&storage, "v1");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert!(response.text().contains("You are offline"));
  }
}
