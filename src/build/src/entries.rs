/* src/build/src/entries.rs */

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use pyra_core::{BundleEntry, ScanOutcome, UiAdapter, sanitize_id};

/// Entry sets for the two bundle passes, plus the name mapping needed to
/// correlate metadata back to middleware source files.
#[derive(Debug, Default)]
pub struct EntryPlan {
  pub client: Vec<BundleEntry>,
  pub server: Vec<BundleEntry>,
  pub middleware_names: HashMap<PathBuf, String>,
}

pub fn layout_entry_name(id: &str) -> String {
  format!("layout_{}", sanitize_id(id))
}

pub fn error_entry_name(id: &str) -> String {
  format!("error_{}", sanitize_id(id))
}

pub const NOT_FOUND_ENTRY: &str = "notfound";

/// Relative import specifier from `from_dir` to `to`, with an explicit
/// `./` or `../` prefix as module resolution requires.
pub fn relative_import(from_dir: &Path, to: &Path) -> String {
  let from: Vec<Component<'_>> = from_dir.components().collect();
  let target: Vec<Component<'_>> = to.components().collect();
  let mut shared = 0;
  while shared < from.len() && shared < target.len() && from[shared] == target[shared] {
    shared += 1;
  }
  let ups = from.len() - shared;
  let mut parts: Vec<String> = Vec::new();
  if ups == 0 {
    parts.push(".".to_string());
  } else {
    for _ in 0..ups {
      parts.push("..".to_string());
    }
  }
  for component in &target[shared..] {
    parts.push(component.as_os_str().to_string_lossy().into_owned());
  }
  parts.join("/")
}

/// Build the entry sets for both passes. Page client entries are tiny
/// synthesized modules whose content is the adapter's hydration script for
/// the page import; everything else bundles its source file directly.
pub fn plan_entries(
  outcome: &ScanOutcome,
  adapter: &dyn UiAdapter,
  container_id: &str,
  entries_dir: &Path,
) -> Result<EntryPlan> {
  std::fs::create_dir_all(entries_dir)
    .with_context(|| format!("failed to create {}", entries_dir.display()))?;

  let mut plan = EntryPlan::default();

  for route in &outcome.routes {
    let name = sanitize_id(&route.id);
    if route.is_page() {
      let import = relative_import(entries_dir, &route.file_path);
      let source = entries_dir.join(format!("{name}.entry.mjs"));
      let content = adapter.hydration_script(&import, container_id, &[]);
      std::fs::write(&source, content)
        .with_context(|| format!("failed to write {}", source.display()))?;
      plan.client.push(BundleEntry { name: name.clone(), source });
    }
    plan.server.push(BundleEntry { name, source: route.file_path.clone() });
  }

  for (id, path) in &outcome.layouts {
    let name = layout_entry_name(id);
    plan.client.push(BundleEntry { name: name.clone(), source: path.clone() });
    plan.server.push(BundleEntry { name, source: path.clone() });
  }

  for (id, path) in &outcome.error_overlays {
    let name = error_entry_name(id);
    plan.client.push(BundleEntry { name: name.clone(), source: path.clone() });
    plan.server.push(BundleEntry { name, source: path.clone() });
  }

  for (id, path) in &outcome.middleware {
    let name = format!("mw_{}", sanitize_id(id));
    plan.middleware_names.insert(path.clone(), name.clone());
    plan.server.push(BundleEntry { name, source: path.clone() });
  }

  if let Some(path) = &outcome.not_found {
    plan.client.push(BundleEntry { name: NOT_FOUND_ENTRY.to_string(), source: path.clone() });
    plan.server.push(BundleEntry { name: NOT_FOUND_ENTRY.to_string(), source: path.clone() });
  }

  Ok(plan)
}
