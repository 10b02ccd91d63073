/* src/core/src/cookies.rs */

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
  Strict,
  Lax,
  None,
}

impl SameSite {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Strict => "Strict",
      Self::Lax => "Lax",
      Self::None => "None",
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
  pub max_age: Option<i64>,
  pub expires: Option<String>,
  pub path: Option<String>,
  pub domain: Option<String>,
  pub secure: bool,
  pub http_only: bool,
  pub same_site: Option<SameSite>,
}

/// Parsed request cookies plus a queue of pending `Set-Cookie` strings.
///
/// Reads always see writes made earlier in the same request. The pending
/// queue is flushed into the response headers at one point, after the
/// middleware chain returns.
#[derive(Debug, Default)]
pub struct CookieJar {
  values: BTreeMap<String, String>,
  pending: Vec<String>,
}

impl CookieJar {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse an incoming `Cookie` header (`name=value; name2=value2`).
  /// Values are percent-decoded; malformed pairs are skipped.
  pub fn parse(header: &str) -> Self {
    let mut values = BTreeMap::new();
    for pair in header.split(';') {
      let pair = pair.trim();
      if pair.is_empty() {
        continue;
      }
      let Some((name, value)) = pair.split_once('=') else { continue };
      let name = name.trim();
      if name.is_empty() {
        continue;
      }
      values.insert(name.to_string(), percent_decode(value.trim()));
    }
    Self { values, pending: Vec::new() }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.values.get(name).map(String::as_str)
  }

  pub fn set(&mut self, name: &str, value: &str, options: &CookieOptions) {
    self.values.insert(name.to_string(), value.to_string());
    self.pending.push(serialize_set_cookie(name, value, options));
  }

  pub fn delete(&mut self, name: &str) {
    self.values.remove(name);
    let options = CookieOptions { max_age: Some(0), path: Some("/".to_string()), ..Default::default() };
    self.pending.push(serialize_set_cookie(name, "", &options));
  }

  pub fn pending(&self) -> &[String] {
    &self.pending
  }

  pub fn drain_pending(&mut self) -> Vec<String> {
    std::mem::take(&mut self.pending)
  }
}

/// Serialize one `Set-Cookie` header value. Attribute order is fixed:
/// Max-Age, Expires, Path, Domain, Secure, HttpOnly, SameSite.
fn serialize_set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
  let mut out = format!("{name}={}", percent_encode(value));
  if let Some(max_age) = options.max_age {
    out.push_str(&format!("; Max-Age={max_age}"));
  }
  if let Some(ref expires) = options.expires {
    out.push_str(&format!("; Expires={expires}"));
  }
  if let Some(ref path) = options.path {
    out.push_str(&format!("; Path={path}"));
  }
  if let Some(ref domain) = options.domain {
    out.push_str(&format!("; Domain={domain}"));
  }
  if options.secure {
    out.push_str("; Secure");
  }
  if options.http_only {
    out.push_str("; HttpOnly");
  }
  if let Some(same_site) = options.same_site {
    out.push_str(&format!("; SameSite={}", same_site.as_str()));
  }
  out
}

/// Percent-decode a cookie value. Invalid escapes pass through verbatim.
fn percent_decode(value: &str) -> String {
  let bytes = value.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%'
      && let (Some(hi), Some(lo)) = (
        bytes.get(i + 1).copied().and_then(hex_val),
        bytes.get(i + 2).copied().and_then(hex_val),
      )
    {
      out.push(hi * 16 + lo);
      i += 3;
      continue;
    }
    out.push(bytes[i]);
    i += 1;
  }
  String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
  match b {
    b'0'..=b'9' => Some(b - b'0'),
    b'a'..=b'f' => Some(b - b'a' + 10),
    b'A'..=b'F' => Some(b - b'A' + 10),
    _ => None,
  }
}

/// Percent-encode a cookie value: RFC 6265 cookie-octets pass through,
/// everything else becomes `%XX`.
fn percent_encode(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for byte in value.bytes() {
    let safe = byte.is_ascii_alphanumeric()
      || matches!(
        byte,
        b'!' | b'#' | b'$' | b'\'' | b'(' | b')' | b'*' | b'+' | b'-' | b'.' | b'/' | b':'
          | b'<' | b'=' | b'>' | b'?' | b'@' | b'[' | b']' | b'^' | b'_' | b'`' | b'{' | b'|'
          | b'}' | b'~'
      );
    if safe {
      out.push(byte as char);
    } else {
      out.push_str(&format!("%{byte:02X}"));
    }
  }
  out
}
