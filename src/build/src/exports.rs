/* src/build/src/exports.rs */

// Lexer-level export detection: enough to learn which top-level exports a
// route module declares without parsing the language. Used to cross-check
// bundler metadata and as the fallback when a pass emits none.

use std::sync::LazyLock;

use regex::Regex;

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)^\s*export\s+(?:async\s+)?(?:function|class|const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)")
    .expect("export decl regex")
});

static EXPORT_DEFAULT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\b").expect("export default regex"));

static EXPORT_LIST: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"export\s*\{([^}]*)\}").expect("export list regex"));

/// Names a module exports, in declaration order, deduplicated. The default
/// export is reported as `default`.
pub fn detect_exports(source: &str) -> Vec<String> {
  let mut names: Vec<String> = Vec::new();
  let mut push = |name: &str| {
    if !name.is_empty() && !names.iter().any(|n| n == name) {
      names.push(name.to_string());
    }
  };

  for capture in EXPORT_DECL.captures_iter(source) {
    if let Some(name) = capture.get(1) {
      push(name.as_str());
    }
  }
  if EXPORT_DEFAULT.is_match(source) {
    push("default");
  }
  for capture in EXPORT_LIST.captures_iter(source) {
    let Some(list) = capture.get(1) else { continue };
    for item in list.as_str().split(',') {
      let item = item.trim();
      if item.is_empty() {
        continue;
      }
      // `original as exported` exposes the right-hand name
      let exported = item.rsplit(" as ").next().unwrap_or(item).trim();
      push(exported);
    }
  }
  names
}
