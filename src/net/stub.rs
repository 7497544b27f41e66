//! Scripted network for tests.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::client::Network;
use super::types::{Request, Response};

#[derive(Clone)]
enum Route {
  Respond(Response),
  Fail,
}

/// Network stub keyed by absolute URL. Unrouted URLs fail like an
/// unreachable host.
#[derive(Default)]
pub struct StubNetwork {
  routes: Mutex<HashMap<String, (Route, Duration)>>,
  calls: Mutex<Vec<(Method, String)>>,
}

impl StubNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self.set(url, Route::Respond(response), Duration::ZERO);
  }

  pub fn respond_after(&self, url: &str, response: Response, delay: Duration) {
    self.set(url, Route::Respond(response), delay);
  }

  pub fn fail(&self, url: &str) {
    self.set(url, Route::Fail, Duration::ZERO);
  }

  pub fn fail_after(&self, url: &str, delay: Duration) {
    self.set(url, Route::Fail, delay);
  }

  pub fn calls(&self) -> Vec<(Method, String)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self, url: &str) -> usize {
    self.calls().iter().filter(|(_, u)| u == url).count()
  }

  fn set(&self, url: &str, route: Route, delay: Duration) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), (route, delay));
  }
}

impl Network for StubNetwork {
  fn fetch(&self, request: &Request) -> BoxFuture<'static, Result<Response>> {
    let url = request.url.to_string();
    self
      .calls
      .lock()
      .unwrap()
      .push((request.method.clone(), url.clone()));

    let route = self.routes.lock().unwrap().get(&url).cloned();

    async move {
      match route {
        Some((route, delay)) => {
          if !delay.is_zero() {
            tokio::time::sleep(delay).await;
          }
          match route {
            Route::Respond(response) => Ok(response),
            Route::Fail => Err(eyre!("Failed to fetch {}: connection refused", url)),
          }
        }
        None => Err(eyre!("Failed to fetch {}: host unreachable", url)),
      }
    }
    .boxed()
  }
}
