/* src/core/src/route.rs */

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
  Page,
  Api,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
  #[default]
  Ssr,
  Spa,
  Ssg,
}

impl RenderMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ssr => "ssr",
      Self::Spa => "spa",
      Self::Ssg => "ssg",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "ssr" => Some(Self::Ssr),
      "spa" => Some(Self::Spa),
      "ssg" => Some(Self::Ssg),
      _ => None,
    }
  }
}

/// Per-route cache directives, all in seconds. Emitted as a `Cache-Control`
/// header when the response does not already carry one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDirectives {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_age: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub s_max_age: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stale_while_revalidate: Option<u32>,
}

impl CacheDirectives {
  pub fn header_value(&self) -> String {
    let mut parts = Vec::new();
    if let Some(v) = self.max_age {
      parts.push(format!("max-age={v}"));
    }
    if let Some(v) = self.s_max_age {
      parts.push(format!("s-maxage={v}"));
    }
    if let Some(v) = self.stale_while_revalidate {
      parts.push(format!("stale-while-revalidate={v}"));
    }
    if parts.is_empty() {
      return "no-cache".to_string();
    }
    format!("public, {}", parts.join(", "))
  }
}

/// One route discovered under the routes root.
///
/// `id` is the directory-derived identifier (`/`, `/blog`, `/blog/[slug]`);
/// `pattern` is the URL template with `:param` and `*catchall` placeholders.
/// Overlay chains are ordered outermost to innermost.
#[derive(Debug, Clone)]
pub struct Route {
  pub id: String,
  pub pattern: String,
  pub kind: RouteKind,
  pub file_path: PathBuf,
  pub params: Vec<String>,
  pub layout_chain: Vec<String>,
  pub middleware_chain: Vec<PathBuf>,
  pub error_boundary: Option<String>,
  pub render_mode: RenderMode,
}

impl Route {
  pub fn is_page(&self) -> bool {
    self.kind == RouteKind::Page
  }

  pub fn is_api(&self) -> bool {
    self.kind == RouteKind::Api
  }
}

/// Convert a route id into its URL pattern: `[p]` -> `:p`, `[...p]` -> `*p`.
pub fn id_to_pattern(id: &str) -> String {
  if id == "/" {
    return "/".to_string();
  }
  let segments: Vec<String> = id
    .split('/')
    .map(|seg| {
      if let Some(inner) = seg.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
        format!("*{inner}")
      } else if let Some(inner) = seg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        format!(":{inner}")
      } else {
        seg.to_string()
      }
    })
    .collect();
  segments.join("/")
}

/// Extract parameter names from a pattern, in segment order.
pub fn pattern_params(pattern: &str) -> Vec<String> {
  pattern
    .split('/')
    .filter_map(|seg| {
      seg
        .strip_prefix(':')
        .or_else(|| seg.strip_prefix('*'))
        .map(std::string::ToString::to_string)
    })
    .collect()
}

/// Flatten a route id into an identifier safe for entry names and file
/// stems: `/` -> `index`, `/blog/[slug]` -> `blog_slug`.
pub fn sanitize_id(id: &str) -> String {
  if id == "/" {
    return "index".to_string();
  }
  let mut out = String::with_capacity(id.len());
  for ch in id.trim_start_matches('/').chars() {
    if ch.is_ascii_alphanumeric() {
      out.push(ch);
    } else if !out.ends_with('_') {
      out.push('_');
    }
  }
  out.trim_matches('_').to_string()
}

/// Relative prebuilt-HTML path for a request path: `/` -> `index.html`,
/// `/releases/1.0` -> `releases/1.0/index.html`. The prerender loop writes
/// here and the production server reads from here.
pub fn html_output_path(request_path: &str) -> String {
  let trimmed = request_path.trim_matches('/');
  if trimmed.is_empty() {
    "index.html".to_string()
  } else {
    format!("{trimmed}/index.html")
  }
}

/// Substitute concrete param values into a pattern, producing a request path.
/// Used by the prerender loop to turn `/releases/:version` + `{version: "1.0"}`
/// into `/releases/1.0`.
pub fn substitute_params(
  pattern: &str,
  params: &std::collections::HashMap<String, String>,
) -> String {
  let segments: Vec<String> = pattern
    .split('/')
    .map(|seg| {
      if let Some(name) = seg.strip_prefix(':').or_else(|| seg.strip_prefix('*')) {
        params.get(name).cloned().unwrap_or_default()
      } else {
        seg.to_string()
      }
    })
    .collect();
  let joined = segments.join("/");
  if joined.is_empty() { "/".to_string() } else { joined }
}
