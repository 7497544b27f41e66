use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;

use crate::config::Config;

use super::types::{Request, Response};

/// The network as seen by the worker.
///
/// `Err` means no response could be obtained at all (DNS, connect, timeout,
/// body read). Any HTTP status, including 4xx and 5xx, is `Ok`.
pub trait Network: Send + Sync + 'static {
  fn fetch(&self, request: &Request) -> BoxFuture<'static, Result<Response>>;
}

/// Network backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.network.timeout_secs))
      .user_agent(concat!("offline-proxy/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Network for HttpNetwork {
  fn fetch(&self, request: &Request) -> BoxFuture<'static, Result<Response>> {
    let client = self.client.clone();
    let method = request.method.clone();
    let url = request.url.clone();
    let headers = request.headers.clone();

    async move {
      let mut builder = client.request(method, url.clone());
      for (name, value) in headers {
        builder = builder.header(name, value);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

      let status = response.status();
      let headers = response
        .headers()
        .iter()
        .map(|(k, v)| {
          (
            k.as_str().to_string(),
            String::from_utf8_lossy(v.as_bytes()).into_owned(),
          )
        })
        .collect();

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?;

      Ok(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body: body.to_vec(),
      })
    }
    .boxed()
  }
}
