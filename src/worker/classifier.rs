use reqwest::Method;
use url::Url;

use crate::net::Request;

/// URL schemes used by browser extensions. Requests to these are never proxied.
pub const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension", "safari-web-extension"];

/// How the worker handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Page navigation: network first, then cache, then the offline page
  Navigation,
  /// Not intercepted at all; goes straight to the network
  NonCacheable,
  /// Static resource: stale-while-revalidate
  Static,
}

/// Classify a request. Rules apply in order; the first match wins.
pub fn classify(request: &Request) -> RequestClass {
  if request.method != Method::GET {
    return RequestClass::NonCacheable;
  }

  if is_extension_url(&request.url) {
    return RequestClass::NonCacheable;
  }

  if request.is_navigation() {
    RequestClass::Navigation
  } else {
    RequestClass::Static
  }
}

fn is_extension_url(url: &Url) -> bool {
  EXTENSION_SCHEMES.contains(&url.scheme())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_post_is_non_cacheable() {
    let request = Request::navigate(url("https://example.com/login")).with_method(Method::POST);
    assert_eq!(classify(&request), RequestClass::NonCacheable);
  }

  #[test]
  fn test_other_mutating_methods_are_non_cacheable() {
    for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
      let request = Request::get(url("https://example.com/x")).with_method(method);
      assert_eq!(classify(&request), RequestClass::NonCacheable);
    }
  }

  #[test]
  fn test_extension_scheme_is_not_intercepted() {
    let request = Request::get(url("chrome-extension://abcdef/content.js"));
    assert_eq!(classify(&request), RequestClass::NonCacheable);

    let request = Request::navigate(url("moz-extension://1234/page.html"));
    assert_eq!(classify(&request), RequestClass::NonCacheable);
  }

  #[test]
  fn test_navigation() {
    let request = Request::navigate(url("https://example.com/dashboard"));
    assert_eq!(classify(&request), RequestClass::Navigation);
  }

  #[test]
  fn test_static() {
    let request = Request::get(url("https://cdn.example.net/app.js"));
    assert_eq!(classify(&request), RequestClass::Static);
  }
}
