/* src/core/src/module.rs */

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::adapter::Component;
use crate::context::Ctx;
use crate::errors::PyraError;
use crate::response::Response;
use crate::route::{CacheDirectives, RenderMode};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a page `load` produced: data for the render, or a response that
/// short-circuits the page entirely.
pub enum LoadOutcome {
  Data(serde_json::Value),
  Response(Response),
}

pub type LoadFn = Arc<dyn Fn(Ctx) -> BoxFuture<Result<LoadOutcome, PyraError>> + Send + Sync>;

pub type ApiHandlerFn = Arc<dyn Fn(Ctx) -> BoxFuture<Result<Response, PyraError>> + Send + Sync>;

/// Continuation handed to a middleware. Calling it runs the rest of the
/// chain; returning without calling it short-circuits.
pub type NextFn = Box<dyn FnOnce() -> BoxFuture<Result<Response, PyraError>> + Send>;

pub type MiddlewareFn =
  Arc<dyn Fn(Ctx, NextFn) -> BoxFuture<Result<Response, PyraError>> + Send + Sync>;

pub type PathsFn = Arc<dyn Fn() -> Vec<HashMap<String, String>> + Send + Sync>;

/// The `prerender` export: a flag, or a generator of per-variant params.
#[derive(Clone)]
pub enum Prerender {
  Flag(bool),
  Paths(PathsFn),
}

impl Prerender {
  pub fn is_enabled(&self) -> bool {
    match self {
      Self::Flag(enabled) => *enabled,
      Self::Paths(_) => true,
    }
  }

  /// Param sets to prerender: one empty set for a flag, one per entry for
  /// a paths generator.
  pub fn variants(&self) -> Vec<HashMap<String, String>> {
    match self {
      Self::Flag(true) => vec![HashMap::new()],
      Self::Flag(false) => Vec::new(),
      Self::Paths(paths) => paths(),
    }
  }
}

impl std::fmt::Debug for Prerender {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Flag(v) => write!(f, "Prerender::Flag({v})"),
      Self::Paths(_) => write!(f, "Prerender::Paths(..)"),
    }
  }
}

/// HTTP method names recognized as API handler exports, in `Allow` order.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// The callable table behind one compiled route module. Populated once per
/// module by the bundler service; the pipeline only ever calls through it,
/// never reflects.
#[derive(Default, Clone)]
pub struct ModuleExports {
  /// Default export: the page/layout/error component, opaque to the core.
  pub component: Option<Component>,
  pub load: Option<LoadFn>,
  pub render: Option<RenderMode>,
  pub prerender: Option<Prerender>,
  pub cache: Option<CacheDirectives>,
  /// API handlers keyed by uppercase method name.
  pub handlers: HashMap<String, ApiHandlerFn>,
  pub middleware: Option<MiddlewareFn>,
}

impl ModuleExports {
  /// Export names in the order the build's export detector reports them.
  pub fn export_names(&self) -> Vec<String> {
    let mut names = Vec::new();
    if self.component.is_some() {
      names.push("default".to_string());
    }
    if self.load.is_some() {
      names.push("load".to_string());
    }
    if self.render.is_some() {
      names.push("render".to_string());
    }
    if self.prerender.is_some() {
      names.push("prerender".to_string());
    }
    if self.cache.is_some() {
      names.push("cache".to_string());
    }
    for method in HTTP_METHODS {
      if self.handlers.contains_key(method) {
        names.push(method.to_string());
      }
    }
    names
  }

  /// Methods this module handles, in canonical `Allow` order.
  pub fn allowed_methods(&self) -> Vec<String> {
    HTTP_METHODS
      .iter()
      .filter(|m| self.handlers.contains_key(**m))
      .map(|m| (*m).to_string())
      .collect()
  }
}

impl std::fmt::Debug for ModuleExports {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModuleExports").field("exports", &self.export_names()).finish()
  }
}

/// Resolve the render mode for a page module. Precedence: an explicit
/// `render` export, then a truthy `prerender` (implies ssg), then the
/// configured default.
pub fn resolve_render_mode(exports: &ModuleExports, default: RenderMode) -> RenderMode {
  if let Some(mode) = exports.render {
    return mode;
  }
  if exports.prerender.as_ref().is_some_and(Prerender::is_enabled) {
    return RenderMode::Ssg;
  }
  default
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn render_export_wins_over_prerender() {
    let exports = ModuleExports {
      render: Some(RenderMode::Spa),
      prerender: Some(Prerender::Flag(true)),
      ..Default::default()
    };
    assert_eq!(resolve_render_mode(&exports, RenderMode::Ssr), RenderMode::Spa);
  }

  #[test]
  fn truthy_prerender_implies_ssg() {
    let exports = ModuleExports { prerender: Some(Prerender::Flag(true)), ..Default::default() };
    assert_eq!(resolve_render_mode(&exports, RenderMode::Ssr), RenderMode::Ssg);
  }

  #[test]
  fn falsy_prerender_falls_through_to_default() {
    let exports = ModuleExports { prerender: Some(Prerender::Flag(false)), ..Default::default() };
    assert_eq!(resolve_render_mode(&exports, RenderMode::Ssr), RenderMode::Ssr);
  }

  #[test]
  fn paths_prerender_implies_ssg() {
    let paths: PathsFn = Arc::new(|| {
      vec![HashMap::from([("version".to_string(), "1.0".to_string())])]
    });
    let exports = ModuleExports { prerender: Some(Prerender::Paths(paths)), ..Default::default() };
    assert_eq!(resolve_render_mode(&exports, RenderMode::Spa), RenderMode::Ssg);
  }

  #[test]
  fn default_applies_without_exports() {
    let exports = ModuleExports::default();
    assert_eq!(resolve_render_mode(&exports, RenderMode::Ssg), RenderMode::Ssg);
    assert_eq!(resolve_render_mode(&exports, RenderMode::Ssr), RenderMode::Ssr);
  }

  #[test]
  fn variants_for_flag_and_paths() {
    assert_eq!(Prerender::Flag(true).variants().len(), 1);
    assert!(Prerender::Flag(false).variants().is_empty());
    let paths: PathsFn = Arc::new(|| {
      vec![
        HashMap::from([("v".to_string(), "1.0".to_string())]),
        HashMap::from([("v".to_string(), "1.1".to_string())]),
      ]
    });
    assert_eq!(Prerender::Paths(paths).variants().len(), 2);
  }

  #[test]
  fn allowed_methods_in_canonical_order() {
    let noop: ApiHandlerFn = Arc::new(|_| Box::pin(async { Ok(Response::new(204)) }));
    let mut exports = ModuleExports::default();
    exports.handlers.insert("POST".to_string(), noop.clone());
    exports.handlers.insert("GET".to_string(), noop);
    assert_eq!(exports.allowed_methods(), ["GET", "POST"]);
  }
}
