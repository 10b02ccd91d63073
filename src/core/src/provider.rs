/* src/core/src/provider.rs */

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::PyraError;
use crate::module::{BoxFuture, ModuleExports};
use crate::route::Route;

/// Client-side asset URLs for one route, consumed by the document
/// assembler: the hydration entry, its transitive shared chunks, CSS, and
/// the layout chain's client modules (outermost first).
#[derive(Debug, Clone, Default)]
pub struct ClientAssets {
  pub entry: Option<String>,
  pub chunks: Vec<String>,
  pub css: Vec<String>,
  pub layouts: Vec<String>,
}

/// How the request pipeline obtains module tables and prebuilt files.
///
/// The development server implements this over on-demand compilation; the
/// production server over modules preloaded from the manifest. The
/// pipeline itself stays identical.
pub trait ModuleProvider: Send + Sync {
  fn page_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>>;

  fn api_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>>;

  /// Layout module for a layout directory id from a route's layout chain.
  fn layout_module(&self, id: String) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>>;

  /// Middleware module for a source path from a route's middleware chain.
  fn middleware_module(&self, path: PathBuf) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>>;

  /// Error overlay for a boundary directory id, when one exists.
  fn error_module(&self, id: String) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>>;

  /// The custom root 404 page, when one was discovered.
  fn not_found_module(&self) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>>;

  /// Prebuilt HTML file for an SSG route and request path, when present.
  fn prerendered_html(&self, route: &Route, path: &str) -> Option<PathBuf>;

  /// The SPA fallback shell file, when one was built.
  fn spa_shell(&self) -> Option<PathBuf>;

  /// Client asset URLs for a route id (`/404` for the not-found page).
  fn client_assets(&self, route_id: &str) -> ClientAssets;
}
