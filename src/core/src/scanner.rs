/* src/core/src/scanner.rs */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::PyraError;
use crate::route::{Route, RouteKind, id_to_pattern, pattern_params};

static SEGMENT_PARAM: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\[(\.\.\.)?([A-Za-z_][A-Za-z0-9_]*)\]$").expect("segment regex"));

/// Everything discovered under the routes root. Overlay maps are keyed by
/// the directory id they live in (group segments included, so overlays
/// inside `(marketing)` scope to that subtree only).
#[derive(Debug, Default)]
pub struct ScanOutcome {
  pub routes: Vec<Route>,
  pub layouts: BTreeMap<String, PathBuf>,
  pub middleware: BTreeMap<String, PathBuf>,
  pub error_overlays: BTreeMap<String, PathBuf>,
  pub not_found: Option<PathBuf>,
  pub root_missing: bool,
}

impl ScanOutcome {
  pub fn route(&self, id: &str) -> Option<&Route> {
    self.routes.iter().find(|r| r.id == id)
  }

  /// Direct children of `id`: routes whose id extends it by exactly the
  /// segments no other route sits between. Tooling only.
  pub fn children_of(&self, id: &str) -> Vec<&Route> {
    let prefix = if id == "/" { String::from("/") } else { format!("{id}/") };
    self
      .routes
      .iter()
      .filter(|r| r.id != id && r.id.starts_with(&prefix))
      .filter(|r| {
        !self.routes.iter().any(|mid| {
          mid.id != id
            && mid.id != r.id
            && mid.id.starts_with(&prefix)
            && r.id.starts_with(&format!("{}/", mid.id))
        })
      })
      .collect()
  }
}

/// Sentinel files found in one directory during the walk.
#[derive(Debug, Default)]
struct DirEntries {
  page: Option<PathBuf>,
  api: Option<PathBuf>,
  layout: Option<PathBuf>,
  middleware: Option<PathBuf>,
  error: Option<PathBuf>,
  not_found: Option<PathBuf>,
  subdirs: Vec<(String, PathBuf)>,
}

/// Walk the routes root and classify files by sentinel name.
///
/// `page_extensions` is the adapter-advertised extension list for page,
/// layout, error, and 404 files (`tsx`, `jsx`, ...). API and middleware
/// files are always `route.ts|js` / `middleware.ts|js`.
///
/// A missing root is not an error: the outcome comes back empty with
/// `root_missing` set, which the build orchestrator reads as the signal to
/// take the single-page-application path.
pub fn scan(root: &Path, page_extensions: &[String]) -> Result<ScanOutcome, PyraError> {
  let mut outcome = ScanOutcome::default();
  if !root.is_dir() {
    outcome.root_missing = true;
    return Ok(outcome);
  }

  let mut chains = AncestryChains::default();
  walk(root, "/", page_extensions, &mut outcome, &mut chains, true)?;
  outcome.routes.sort_by(|a, b| a.id.cmp(&b.id));
  Ok(outcome)
}

/// Overlay state carried down the recursion: outermost entries first.
#[derive(Debug, Default, Clone)]
struct AncestryChains {
  layouts: Vec<String>,
  middleware: Vec<PathBuf>,
  error_scope: Option<String>,
}

fn read_dir_entries(
  dir: &Path,
  page_extensions: &[String],
  at_root: bool,
) -> Result<DirEntries, PyraError> {
  let mut entries = DirEntries::default();
  let mut names: Vec<(String, PathBuf, bool)> = Vec::new();

  let read = std::fs::read_dir(dir)
    .map_err(|e| PyraError::scan(format!("failed to read {}: {e}", dir.display())))?;
  for entry in read {
    let entry = entry.map_err(|e| PyraError::scan(e.to_string()))?;
    let path = entry.path();
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
    let is_dir = path.is_dir();
    names.push((name.to_string(), path, is_dir));
  }
  // Deterministic walk order regardless of filesystem
  names.sort_by(|a, b| a.0.cmp(&b.0));

  for (name, path, is_dir) in names {
    if is_dir {
      entries.subdirs.push((name, path));
      continue;
    }
    let Some((stem, ext)) = name.rsplit_once('.') else { continue };
    let page_ext = page_extensions.iter().any(|e| e == ext);
    match stem {
      "page" if page_ext => entries.page = Some(path),
      "route" if ext == "ts" || ext == "js" => entries.api = Some(path),
      "layout" if page_ext => entries.layout = Some(path),
      "middleware" if ext == "ts" || ext == "js" => entries.middleware = Some(path),
      "error" if page_ext => entries.error = Some(path),
      "404" if page_ext && at_root => entries.not_found = Some(path),
      _ => {}
    }
  }
  Ok(entries)
}

fn walk(
  dir: &Path,
  dir_id: &str,
  page_extensions: &[String],
  outcome: &mut ScanOutcome,
  chains: &mut AncestryChains,
  at_root: bool,
) -> Result<(), PyraError> {
  let entries = read_dir_entries(dir, page_extensions, at_root)?;

  if entries.page.is_some() && entries.api.is_some() {
    return Err(PyraError::scan(format!(
      "route conflict in {}: a directory may declare a page file or an API file, not both",
      dir.display()
    )));
  }

  if at_root {
    outcome.not_found = entries.not_found.clone();
  }

  // Overlays registered before routes so a directory's own layout wraps
  // its own page.
  let pushed_layout = if let Some(layout) = entries.layout {
    outcome.layouts.insert(dir_id.to_string(), layout);
    chains.layouts.push(dir_id.to_string());
    true
  } else {
    false
  };
  let pushed_middleware = if let Some(mw) = entries.middleware {
    outcome.middleware.insert(dir_id.to_string(), mw.clone());
    chains.middleware.push(mw);
    true
  } else {
    false
  };
  let prev_error_scope = chains.error_scope.clone();
  if let Some(error) = entries.error {
    outcome.error_overlays.insert(dir_id.to_string(), error);
    chains.error_scope = Some(dir_id.to_string());
  }

  let route_id = url_id(dir_id);
  if let Some(page) = entries.page {
    outcome.routes.push(make_route(&route_id, RouteKind::Page, page, chains));
  } else if let Some(api) = entries.api {
    outcome.routes.push(make_route(&route_id, RouteKind::Api, api, chains));
  }

  for (name, path) in entries.subdirs {
    validate_segment(&name, &path)?;
    let child_id = if dir_id == "/" { format!("/{name}") } else { format!("{dir_id}/{name}") };
    walk(&path, &child_id, page_extensions, outcome, chains, false)?;
  }

  if pushed_layout {
    chains.layouts.pop();
  }
  if pushed_middleware {
    chains.middleware.pop();
  }
  chains.error_scope = prev_error_scope;
  Ok(())
}

fn make_route(id: &str, kind: RouteKind, file_path: PathBuf, chains: &AncestryChains) -> Route {
  let pattern = id_to_pattern(id);
  let params = pattern_params(&pattern);
  Route {
    id: id.to_string(),
    pattern,
    kind,
    file_path,
    params,
    layout_chain: chains.layouts.clone(),
    middleware_chain: chains.middleware.clone(),
    error_boundary: chains.error_scope.clone(),
    render_mode: crate::route::RenderMode::Ssr,
  }
}

fn validate_segment(name: &str, path: &Path) -> Result<(), PyraError> {
  if name.starts_with('[') || name.ends_with(']') {
    if !SEGMENT_PARAM.is_match(name) {
      return Err(PyraError::scan(format!(
        "malformed dynamic segment \"{name}\" at {}",
        path.display()
      )));
    }
  }
  Ok(())
}

/// Strip route-group segments from a directory id to get the URL-facing id.
fn url_id(dir_id: &str) -> String {
  if dir_id == "/" {
    return "/".to_string();
  }
  let kept: Vec<&str> = dir_id
    .split('/')
    .filter(|seg| !seg.is_empty() && !(seg.starts_with('(') && seg.ends_with(')')))
    .collect();
  if kept.is_empty() { "/".to_string() } else { format!("/{}", kept.join("/")) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  fn exts() -> Vec<String> {
    vec!["tsx".to_string(), "jsx".to_string()]
  }

  fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, "export default {}\n").expect("write");
  }

  #[test]
  fn missing_root_is_flagged_not_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let outcome = scan(&tmp.path().join("routes"), &exts()).expect("scan");
    assert!(outcome.root_missing);
    assert!(outcome.routes.is_empty());
  }

  #[test]
  fn classifies_pages_and_apis() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("page.tsx"));
    touch(&root.join("about/page.tsx"));
    touch(&root.join("api/users/route.ts"));

    let outcome = scan(root, &exts()).expect("scan");
    let ids: Vec<&str> = outcome.routes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["/", "/about", "/api/users"]);
    assert!(outcome.route("/").expect("root").is_page());
    assert!(outcome.route("/api/users").expect("api").is_api());
  }

  #[test]
  fn dynamic_and_catch_all_patterns() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("blog/[slug]/page.tsx"));
    touch(&root.join("api/auth/[...path]/route.ts"));

    let outcome = scan(root, &exts()).expect("scan");
    let blog = outcome.route("/blog/[slug]").expect("blog route");
    assert_eq!(blog.pattern, "/blog/:slug");
    assert_eq!(blog.params, ["slug"]);

    let auth = outcome.route("/api/auth/[...path]").expect("auth route");
    assert_eq!(auth.pattern, "/api/auth/*path");
    assert_eq!(auth.params, ["path"]);
  }

  #[test]
  fn page_and_api_in_one_directory_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("things/page.tsx"));
    touch(&root.join("things/route.ts"));

    let err = scan(root, &exts()).expect_err("conflict");
    assert_eq!(err.code(), "SCAN_ERROR");
    assert!(err.message().contains("not both"));
  }

  #[test]
  fn layout_chain_outermost_first() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("layout.tsx"));
    touch(&root.join("blog/layout.tsx"));
    touch(&root.join("blog/[slug]/page.tsx"));
    touch(&root.join("about/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    let slug = outcome.route("/blog/[slug]").expect("slug");
    assert_eq!(slug.layout_chain, ["/", "/blog"]);
    let about = outcome.route("/about").expect("about");
    assert_eq!(about.layout_chain, ["/"]);
  }

  #[test]
  fn middleware_chain_outermost_first() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("middleware.ts"));
    touch(&root.join("dashboard/middleware.ts"));
    touch(&root.join("dashboard/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    let dash = outcome.route("/dashboard").expect("dashboard");
    assert_eq!(dash.middleware_chain.len(), 2);
    assert!(dash.middleware_chain[0].ends_with("middleware.ts"));
    assert!(dash.middleware_chain[1].ends_with("dashboard/middleware.ts"));
  }

  #[test]
  fn nearest_error_boundary_wins() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("error.tsx"));
    touch(&root.join("shop/error.tsx"));
    touch(&root.join("shop/cart/page.tsx"));
    touch(&root.join("about/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    assert_eq!(outcome.route("/shop/cart").expect("cart").error_boundary.as_deref(), Some("/shop"));
    assert_eq!(outcome.route("/about").expect("about").error_boundary.as_deref(), Some("/"));
  }

  #[test]
  fn route_group_contributes_no_segment_but_scopes_overlays() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("(marketing)/layout.tsx"));
    touch(&root.join("(marketing)/pricing/page.tsx"));
    touch(&root.join("docs/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    let pricing = outcome.route("/pricing").expect("pricing");
    assert_eq!(pricing.layout_chain, ["/(marketing)"]);
    let docs = outcome.route("/docs").expect("docs");
    assert!(docs.layout_chain.is_empty());
  }

  #[test]
  fn not_found_only_recognized_at_root() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("404.tsx"));
    touch(&root.join("blog/404.tsx"));
    touch(&root.join("blog/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    assert!(outcome.not_found.as_ref().is_some_and(|p| p.parent() == Some(root)));
  }

  #[test]
  fn malformed_bracket_segment_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("[bad-name/page.tsx"));

    let err = scan(root, &exts()).expect_err("malformed");
    assert!(err.message().contains("malformed dynamic segment"));
  }

  #[test]
  fn children_links_skip_intermediate_routes() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("page.tsx"));
    touch(&root.join("blog/page.tsx"));
    touch(&root.join("blog/[slug]/page.tsx"));
    touch(&root.join("about/page.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    let root_children: Vec<&str> =
      outcome.children_of("/").iter().map(|r| r.id.as_str()).collect();
    assert_eq!(root_children, ["/about", "/blog"]);
    let blog_children: Vec<&str> =
      outcome.children_of("/blog").iter().map(|r| r.id.as_str()).collect();
    assert_eq!(blog_children, ["/blog/[slug]"]);
  }

  #[test]
  fn layout_without_page_produces_no_route() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    touch(&root.join("admin/layout.tsx"));

    let outcome = scan(root, &exts()).expect("scan");
    assert!(outcome.routes.is_empty());
    assert!(outcome.layouts.contains_key("/admin"));
  }
}
