/* src/core/src/context.rs */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::cookies::{CookieJar, CookieOptions};
use crate::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Development,
  Production,
}

impl Mode {
  pub fn is_dev(self) -> bool {
    self == Self::Development
  }
}

/// Parsed request URL: path and raw query, split by the serving adapter.
#[derive(Debug, Clone, Default)]
pub struct RequestUrl {
  pub path: String,
  pub query: Option<String>,
}

impl RequestUrl {
  pub fn new(path: impl Into<String>, query: Option<String>) -> Self {
    Self { path: path.into(), query }
  }

  pub fn full(&self) -> String {
    match &self.query {
      Some(q) => format!("{}?{q}", self.path),
      None => self.path.clone(),
    }
  }
}

/// Framework-agnostic incoming request, produced by the serving adapter.
#[derive(Debug, Clone, Default)]
pub struct Request {
  pub method: String,
  pub url: RequestUrl,
  pub headers: Vec<(String, String)>,
  pub body: Bytes,
}

impl Request {
  pub fn get(path: &str) -> Self {
    let (path, query) = match path.split_once('?') {
      Some((p, q)) => (p.to_string(), Some(q.to_string())),
      None => (path.to_string(), None),
    };
    Self { method: "GET".to_string(), url: RequestUrl { path, query }, ..Default::default() }
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Collect the environment slice exposed to loaders, middleware, and API
/// handlers: variables whose names start with `prefix`, with it stripped.
pub fn env_slice(prefix: &str) -> HashMap<String, String> {
  std::env::vars()
    .filter_map(|(name, value)| name.strip_prefix(prefix).map(|rest| (rest.to_string(), value)))
    .collect()
}

/// Per-request bag threaded through middleware, loaders, render, and API
/// handlers. Built once per matched request, dropped after the response is
/// written. The cookie jar is the only mutable part.
pub struct RequestContext {
  pub method: String,
  pub url: RequestUrl,
  pub params: HashMap<String, String>,
  pub route_id: String,
  pub mode: Mode,
  pub headers: Vec<(String, String)>,
  pub env: Arc<HashMap<String, String>>,
  pub body: Bytes,
  cookies: Mutex<CookieJar>,
}

pub type Ctx = Arc<RequestContext>;

impl RequestContext {
  pub fn new(
    request: &Request,
    params: HashMap<String, String>,
    route_id: impl Into<String>,
    mode: Mode,
    env: Arc<HashMap<String, String>>,
  ) -> Ctx {
    let jar = match request.header("cookie") {
      Some(header) => CookieJar::parse(header),
      None => CookieJar::new(),
    };
    Arc::new(Self {
      method: request.method.clone(),
      url: request.url.clone(),
      params,
      route_id: route_id.into(),
      mode,
      headers: request.headers.clone(),
      env,
      body: request.body.clone(),
      cookies: Mutex::new(jar),
    })
  }

  /// Synthetic context used by the prerender loop: GET, production mode,
  /// no real cookies, the same env slice as runtime.
  pub fn synthetic(
    path: &str,
    params: HashMap<String, String>,
    route_id: impl Into<String>,
    env: Arc<HashMap<String, String>>,
  ) -> Ctx {
    Arc::new(Self {
      method: "GET".to_string(),
      url: RequestUrl::new(path, None),
      params,
      route_id: route_id.into(),
      mode: Mode::Production,
      headers: Vec::new(),
      env,
      body: Bytes::new(),
      cookies: Mutex::new(CookieJar::new()),
    })
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn env_var(&self, name: &str) -> Option<&str> {
    self.env.get(name).map(String::as_str)
  }

  // -- Cookie jar --

  pub fn cookie(&self, name: &str) -> Option<String> {
    self.cookies.lock().ok()?.get(name).map(str::to_string)
  }

  pub fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
    if let Ok(mut jar) = self.cookies.lock() {
      jar.set(name, value, options);
    }
  }

  pub fn delete_cookie(&self, name: &str) {
    if let Ok(mut jar) = self.cookies.lock() {
      jar.delete(name);
    }
  }

  /// Take the queued `Set-Cookie` values. Called once, at response
  /// finalization; a disconnecting client simply never reaches it.
  pub fn drain_set_cookies(&self) -> Vec<String> {
    match self.cookies.lock() {
      Ok(mut jar) => jar.drain_pending(),
      Err(_) => Vec::new(),
    }
  }

  // -- Response helpers --

  pub fn json(&self, value: &serde_json::Value) -> Response {
    Response::json(value)
  }

  pub fn html(&self, body: impl Into<String>) -> Response {
    Response::html(body)
  }

  pub fn text(&self, body: impl Into<String>) -> Response {
    Response::text(body)
  }

  pub fn redirect(&self, location: &str) -> Response {
    Response::redirect(location, 302)
  }

  pub fn redirect_with_status(&self, location: &str, status: u16) -> Response {
    Response::redirect(location, status)
  }
}
