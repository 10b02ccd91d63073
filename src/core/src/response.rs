/* src/core/src/response.rs */

use bytes::Bytes;

/// Framework-agnostic HTTP response. The serving adapter converts this into
/// its own response type at the edge; the core never touches a framework.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Bytes,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self { status, headers: Vec::new(), body: Bytes::new() }
  }

  pub fn html(body: impl Into<String>) -> Self {
    let mut res = Self::new(200);
    res.set_header("Content-Type", "text/html; charset=utf-8");
    res.body = Bytes::from(body.into());
    res
  }

  pub fn json(value: &serde_json::Value) -> Self {
    let mut res = Self::new(200);
    res.set_header("Content-Type", "application/json");
    res.body = Bytes::from(value.to_string());
    res
  }

  pub fn text(body: impl Into<String>) -> Self {
    let mut res = Self::new(200);
    res.set_header("Content-Type", "text/plain; charset=utf-8");
    res.body = Bytes::from(body.into());
    res
  }

  pub fn redirect(location: &str, status: u16) -> Self {
    let mut res = Self::new(status);
    res.set_header("Location", location);
    res
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = status;
    self
  }

  pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
    self.body = body.into();
    self
  }

  /// First header value matching `name`, case-insensitive.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn has_header(&self, name: &str) -> bool {
    self.header(name).is_some()
  }

  /// Replace every value of `name` with a single new value.
  pub fn set_header(&mut self, name: &str, value: &str) {
    self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    self.headers.push((name.to_string(), value.to_string()));
  }

  /// Add a value without disturbing existing ones (Set-Cookie and friends).
  pub fn append_header(&mut self, name: &str, value: &str) {
    self.headers.push((name.to_string(), value.to_string()));
  }

  /// Insert only when the header is absent.
  pub fn ensure_header(&mut self, name: &str, value: &str) {
    if !self.has_header(name) {
      self.headers.push((name.to_string(), value.to_string()));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn html_sets_content_type() {
    let res = Response::html("<p>hi</p>");
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.body.as_ref(), b"<p>hi</p>");
  }

  #[test]
  fn json_serializes_value() {
    let res = Response::json(&serde_json::json!({"ok": true}));
    assert_eq!(res.header("Content-Type"), Some("application/json"));
    assert_eq!(res.body.as_ref(), br#"{"ok":true}"#);
  }

  #[test]
  fn redirect_carries_location() {
    let res = Response::redirect("/login", 302);
    assert_eq!(res.status, 302);
    assert_eq!(res.header("Location"), Some("/login"));
  }

  #[test]
  fn set_header_replaces_append_accumulates() {
    let mut res = Response::new(200);
    res.append_header("Set-Cookie", "a=1");
    res.append_header("Set-Cookie", "b=2");
    assert_eq!(res.headers.len(), 2);

    res.set_header("Cache-Control", "no-cache");
    res.set_header("Cache-Control", "public, max-age=60");
    assert_eq!(res.header("Cache-Control"), Some("public, max-age=60"));
    assert_eq!(res.headers.iter().filter(|(n, _)| n == "Cache-Control").count(), 1);
  }

  #[test]
  fn ensure_header_keeps_existing() {
    let mut res = Response::new(200);
    res.set_header("Cache-Control", "private");
    res.ensure_header("Cache-Control", "no-cache");
    assert_eq!(res.header("Cache-Control"), Some("private"));
  }
}
