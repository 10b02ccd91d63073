/* src/server/src/prod.rs */

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::try_join_all;
use pyra_core::module::BoxFuture;
use pyra_core::route::{html_output_path, pattern_params};
use pyra_core::{
  BundlerService, ClientAssets, Manifest, MANIFEST_FILE, Mode, ModuleExports, ModuleProvider,
  Pipeline, PipelineOptions, PyraError, Route, RouteEntry, RouteGraph, UiAdapter, env_slice,
};

use crate::service::{SiteSource, build_router, serve};

/// Manifest key reserved for the custom not-found page. It never enters
/// the matcher; the pipeline reaches it through the 404 path only.
const NOT_FOUND_ID: &str = "/404";

#[derive(Debug, Clone)]
pub struct ProdOptions {
  pub out_dir: PathBuf,
  pub env_prefix: String,
  pub host: String,
  pub port: u16,
}

impl Default for ProdOptions {
  fn default() -> Self {
    Self {
      out_dir: PathBuf::from(".pyra/output"),
      env_prefix: "PYRA_".to_string(),
      host: "0.0.0.0".to_string(),
      port: 3000,
    }
  }
}

/// Reconstruct matcher routes from manifest entries.
pub(crate) fn routes_from_manifest(manifest: &Manifest) -> Vec<Route> {
  manifest
    .routes
    .iter()
    .filter(|(id, _)| id.as_str() != NOT_FOUND_ID)
    .map(|(id, entry)| {
      let pattern = entry.pattern().to_string();
      let params = pattern_params(&pattern);
      let (layout_chain, error_boundary) = match entry.page_artifacts() {
        Some(page) => (
          page.layouts.iter().map(|l| l.id.clone()).collect(),
          page.error_boundary.as_ref().map(|b| b.id.clone()),
        ),
        None => (Vec::new(), None),
      };
      Route {
        id: id.clone(),
        pattern,
        kind: entry.route_kind(),
        file_path: PathBuf::from(entry.server_module().unwrap_or_default()),
        params,
        layout_chain,
        middleware_chain: entry.middleware().iter().map(PathBuf::from).collect(),
        error_boundary,
        render_mode: entry.render_mode(),
      }
    })
    .collect()
}

struct ProdSite {
  graph: Arc<RouteGraph>,
  manifest: Manifest,
  client_dir: PathBuf,
  /// Preloaded module tables keyed by server-module path.
  by_path: HashMap<String, Arc<ModuleExports>>,
  /// Error boundaries and layouts by their directory id.
  layouts: HashMap<String, Arc<ModuleExports>>,
  errors: HashMap<String, Arc<ModuleExports>>,
  not_found: Option<Arc<ModuleExports>>,
}

impl SiteSource for ProdSite {
  fn graph(&self) -> Arc<RouteGraph> {
    self.graph.clone()
  }
}

struct ProdProvider {
  site: Arc<ProdSite>,
}

impl ProdProvider {
  fn module_at(&self, path: &Path) -> Result<Arc<ModuleExports>, PyraError> {
    let key = path.to_string_lossy();
    self
      .site
      .by_path
      .get(key.as_ref())
      .cloned()
      .ok_or_else(|| PyraError::internal(format!("module \"{key}\" not loaded at boot")))
  }

  fn prefixed(&self, path: &str) -> String {
    let base = self.site.manifest.base.trim_end_matches('/');
    format!("{base}/{path}")
  }
}

impl ModuleProvider for ProdProvider {
  fn page_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let found = self.module_at(&route.file_path);
    Box::pin(async move { found })
  }

  fn api_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let found = self.module_at(&route.file_path);
    Box::pin(async move { found })
  }

  fn layout_module(&self, id: String) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let found = self
      .site
      .layouts
      .get(&id)
      .cloned()
      .ok_or_else(|| PyraError::internal(format!("layout \"{id}\" not loaded at boot")));
    Box::pin(async move { found })
  }

  fn middleware_module(&self, path: PathBuf) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let found = self.module_at(&path);
    Box::pin(async move { found })
  }

  fn error_module(&self, id: String) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>> {
    let found = self.site.errors.get(&id).cloned();
    Box::pin(async move { Ok(found) })
  }

  fn not_found_module(&self) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>> {
    let found = self.site.not_found.clone();
    Box::pin(async move { Ok(found) })
  }

  fn prerendered_html(&self, route: &Route, path: &str) -> Option<PathBuf> {
    match self.site.manifest.routes.get(&route.id)? {
      RouteEntry::PageSsgSingle { html, .. } => Some(self.site.client_dir.join(html)),
      RouteEntry::PageSsgMulti { .. } => Some(self.site.client_dir.join(html_output_path(path))),
      _ => None,
    }
  }

  fn spa_shell(&self) -> Option<PathBuf> {
    self.site.manifest.spa_fallback.as_ref().map(|p| self.site.client_dir.join(p))
  }

  fn client_assets(&self, route_id: &str) -> ClientAssets {
    let Some(entry) = self.site.manifest.routes.get(route_id) else {
      return ClientAssets::default();
    };
    let Some(client) = entry.client_artifacts() else { return ClientAssets::default() };
    let layouts = entry
      .page_artifacts()
      .map(|page| {
        page.layouts.iter().filter_map(|l| l.client.as_deref()).map(|p| self.prefixed(p)).collect()
      })
      .unwrap_or_default();
    ClientAssets {
      entry: client.client_entry.as_deref().map(|p| self.prefixed(p)),
      chunks: client.client_chunks.iter().map(|p| self.prefixed(p)).collect(),
      css: client.css.iter().map(|p| self.prefixed(p)).collect(),
      layouts,
    }
  }
}

/// Every server-module path the manifest references, deduplicated.
fn server_module_paths(manifest: &Manifest) -> Vec<String> {
  let mut paths = BTreeSet::new();
  for entry in manifest.routes.values() {
    if let Some(path) = entry.server_module() {
      paths.insert(path.to_string());
    }
    for mw in entry.middleware() {
      paths.insert(mw.clone());
    }
    if let Some(page) = entry.page_artifacts() {
      for layout in &page.layouts {
        paths.insert(layout.server.clone());
      }
      if let Some(boundary) = &page.error_boundary {
        paths.insert(boundary.server.clone());
      }
    }
  }
  paths.into_iter().collect()
}

/// The production server: boots from the manifest, preloads every server
/// module, and serves pages, APIs, and static assets.
pub struct ProdServer {
  pipeline: Pipeline,
  site: Arc<ProdSite>,
  options: ProdOptions,
}

impl ProdServer {
  pub async fn load(
    adapter: Arc<dyn UiAdapter>,
    bundler: Arc<dyn BundlerService>,
    options: ProdOptions,
  ) -> Result<Self, PyraError> {
    let manifest = Manifest::from_file(&options.out_dir.join(MANIFEST_FILE))?;
    let graph = Arc::new(RouteGraph::from_routes(routes_from_manifest(&manifest))?);

    // Import every precompiled module once, in parallel, before accepting
    // requests.
    let paths = server_module_paths(&manifest);
    let loaded = try_join_all(
      paths.iter().map(|path| bundler.load_module(options.out_dir.join(path))),
    )
    .await?;
    let by_path: HashMap<String, Arc<ModuleExports>> =
      paths.into_iter().zip(loaded.into_iter().map(|m| m.module)).collect();

    let mut layouts = HashMap::new();
    let mut errors = HashMap::new();
    for entry in manifest.routes.values() {
      let Some(page) = entry.page_artifacts() else { continue };
      for layout in &page.layouts {
        if let Some(module) = by_path.get(&layout.server) {
          layouts.insert(layout.id.clone(), module.clone());
        }
      }
      if let Some(boundary) = &page.error_boundary
        && let Some(module) = by_path.get(&boundary.server)
      {
        errors.insert(boundary.id.clone(), module.clone());
      }
    }
    let not_found = manifest
      .routes
      .get(NOT_FOUND_ID)
      .and_then(RouteEntry::server_module)
      .and_then(|path| by_path.get(path))
      .cloned();

    let site = Arc::new(ProdSite {
      graph,
      client_dir: options.out_dir.join("client"),
      manifest,
      by_path,
      layouts,
      errors,
      not_found,
    });

    let mut pipeline_options =
      PipelineOptions::new(Mode::Production, Arc::new(env_slice(&options.env_prefix)));
    pipeline_options.default_render_mode = site.manifest.default_render_mode;
    pipeline_options.base = site.manifest.base.clone();
    let pipeline = Pipeline::new(adapter, Arc::new(ProdProvider { site: site.clone() }), pipeline_options);

    Ok(Self { pipeline, site, options })
  }

  pub fn router(&self) -> axum::Router {
    let static_roots = vec![self.site.client_dir.clone()];
    let site: Arc<dyn SiteSource> = self.site.clone();
    build_router(self.pipeline.clone(), site, static_roots)
  }

  pub async fn run(self) -> Result<(), PyraError> {
    let addr = format!("{}:{}", self.options.host, self.options.port);
    let router = self.router();
    println!("pyra production server on http://{addr}");
    serve(router, &addr).await
  }
}
