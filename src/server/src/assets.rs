/* src/server/src/assets.rs */

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use bytes::Bytes;
use pyra_core::{Response, mime};
use regex::Regex;

/// Basename stem of a content-hashed build output: `name-HASH` with HASH at
/// least six alphanumerics at the end.
static HASHED_STEM: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"-[A-Za-z0-9]{6,}$").expect("hashed stem regex"));

pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";
pub const NO_CACHE: &str = "no-cache";

/// Resolve a URL path inside a static root, refusing anything that would
/// escape it. Returns the file path only when the file exists.
pub fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
  let relative = url_path.trim_start_matches('/');
  if relative.is_empty() {
    return None;
  }
  let mut resolved = root.to_path_buf();
  for segment in relative.split('/') {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
      return None;
    }
    resolved.push(segment);
  }
  if resolved.is_file() { Some(resolved) } else { None }
}

/// Cache policy for a served file: hashed basenames are immutable for a
/// year, everything else revalidates.
pub fn cache_control_for(path: &Path) -> &'static str {
  let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
  if HASHED_STEM.is_match(stem) { IMMUTABLE_CACHE } else { NO_CACHE }
}

/// Serve one static file. The handle is opened, read, and released within
/// this call on every exit path.
pub fn serve_file(path: &Path) -> Option<Response> {
  let contents = std::fs::read(path).ok()?;
  let mut response = Response::new(200).with_body(Bytes::from(contents));
  response.set_header("Content-Type", mime::from_path(path));
  response.set_header("Content-Length", &response.body.len().to_string());
  response.set_header("Cache-Control", cache_control_for(path));
  Some(response)
}

/// Look up and serve `url_path` from the first static root containing it.
pub fn serve_static(roots: &[PathBuf], url_path: &str) -> Option<Response> {
  roots.iter().find_map(|root| resolve(root, url_path).as_deref().and_then(serve_file))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashed_basename_gets_immutable_cache() {
    assert_eq!(cache_control_for(Path::new("assets/app-9fK3xQz1.js")), IMMUTABLE_CACHE);
    assert_eq!(cache_control_for(Path::new("assets/chunk-abc123.css")), IMMUTABLE_CACHE);
  }

  #[test]
  fn short_or_missing_hash_is_no_cache() {
    assert_eq!(cache_control_for(Path::new("favicon.ico")), NO_CACHE);
    assert_eq!(cache_control_for(Path::new("app-abc.js")), NO_CACHE);
    assert_eq!(cache_control_for(Path::new("robots.txt")), NO_CACHE);
  }

  #[test]
  fn resolve_refuses_traversal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::write(tmp.path().join("ok.txt"), "fine").expect("write");
    assert!(resolve(tmp.path(), "/ok.txt").is_some());
    assert!(resolve(tmp.path(), "/../ok.txt").is_none());
    assert!(resolve(tmp.path(), "/a/../../ok.txt").is_none());
    assert!(resolve(tmp.path(), "/").is_none());
  }

  #[test]
  fn serve_file_sets_type_length_and_cache() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("app-abc123.js");
    std::fs::write(&path, "console.log(1)").expect("write");

    let response = serve_file(&path).expect("served");
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/javascript; charset=utf-8"));
    assert_eq!(response.header("Content-Length"), Some("14"));
    assert_eq!(response.header("Cache-Control"), Some(IMMUTABLE_CACHE));
  }

  #[test]
  fn serve_static_checks_roots_in_order() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    std::fs::write(second.path().join("style.css"), "body{}").expect("write");

    let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
    let response = serve_static(&roots, "/style.css").expect("served");
    assert_eq!(response.header("Content-Type"), Some("text/css; charset=utf-8"));
    assert!(serve_static(&roots, "/missing.css").is_none());
  }
}
