/* src/server/src/dev.rs */

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::Router;
use axum::extract::{Path as AxumPath, State};
use axum::response::IntoResponse;
use axum::routing::get;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use pyra_core::module::BoxFuture;
use pyra_core::{
  BundlerService, ClientAssets, CompiledModule, Mode, ModuleExports, ModuleProvider, Pipeline,
  PipelineOptions, PyraError, RenderMode, Route, RouteGraph, UiAdapter, env_slice, sanitize_id,
  scan,
};
use tokio::sync::OnceCell;

use crate::service::{SiteSource, build_router, serve};

#[derive(Debug, Clone)]
pub struct DevOptions {
  pub routes_dir: PathBuf,
  pub public_dir: Option<PathBuf>,
  pub env_prefix: String,
  pub default_render_mode: RenderMode,
  pub base: String,
  pub host: String,
  pub port: u16,
}

impl Default for DevOptions {
  fn default() -> Self {
    Self {
      routes_dir: PathBuf::from("routes"),
      public_dir: Some(PathBuf::from("public")),
      env_prefix: "PYRA_".to_string(),
      default_render_mode: RenderMode::Ssr,
      base: "/".to_string(),
      host: "127.0.0.1".to_string(),
      port: 3000,
    }
  }
}

/// One coherent snapshot of the scanned site. Replaced wholesale on
/// rescan; in-flight requests keep the snapshot they started with.
pub(crate) struct DevSite {
  pub graph: Arc<RouteGraph>,
  pub layouts: BTreeMap<String, PathBuf>,
  pub error_overlays: BTreeMap<String, PathBuf>,
  pub not_found: Option<PathBuf>,
  /// Client entry slug -> source file, for `/__pyra/client/{slug}.js`.
  pub client_sources: HashMap<String, PathBuf>,
}

impl DevSite {
  fn scan(routes_dir: &Path, extensions: &[String]) -> Result<Self, PyraError> {
    let outcome = scan(routes_dir, extensions)?;
    let mut client_sources = HashMap::new();
    for route in &outcome.routes {
      if route.is_page() {
        client_sources.insert(sanitize_id(&route.id), route.file_path.clone());
      }
    }
    for (id, path) in &outcome.layouts {
      client_sources.insert(format!("layout_{}", sanitize_id(id)), path.clone());
    }
    if let Some(path) = &outcome.not_found {
      client_sources.insert("notfound".to_string(), path.clone());
    }
    let graph = RouteGraph::from_routes(outcome.routes)?;
    Ok(Self {
      graph: Arc::new(graph),
      layouts: outcome.layouts,
      error_overlays: outcome.error_overlays,
      not_found: outcome.not_found,
      client_sources,
    })
  }
}

/// Compiled-module cache: at most one build per entry at a time, repeated
/// invalidation safe, stale entries replaced when the source file is newer.
pub(crate) struct CompileCache {
  entries: tokio::sync::Mutex<HashMap<PathBuf, Arc<OnceCell<CachedModule>>>>,
}

#[derive(Clone)]
struct CachedModule {
  compiled: Arc<CompiledModule>,
  mtime: Option<SystemTime>,
}

impl CompileCache {
  pub fn new() -> Self {
    Self { entries: tokio::sync::Mutex::new(HashMap::new()) }
  }

  pub async fn get_or_compile(
    &self,
    bundler: &dyn BundlerService,
    source: PathBuf,
  ) -> Result<Arc<CompiledModule>, PyraError> {
    let mtime = std::fs::metadata(&source).and_then(|m| m.modified()).ok();
    loop {
      let cell = {
        let mut entries = self.entries.lock().await;
        entries.entry(source.clone()).or_default().clone()
      };
      let source_for_init = source.clone();
      let result = cell
        .get_or_try_init(|| async {
          let compiled = bundler.compile(source_for_init).await?;
          Ok::<_, PyraError>(CachedModule { compiled: Arc::new(compiled), mtime })
        })
        .await;
      match result {
        Ok(cached) => {
          if let (Some(cached_at), Some(current)) = (cached.mtime, mtime)
            && current > cached_at
          {
            self.evict_cell(&source, &cell).await;
            continue;
          }
          return Ok(cached.compiled.clone());
        }
        Err(err) => {
          self.evict_cell(&source, &cell).await;
          return Err(err);
        }
      }
    }
  }

  async fn evict_cell(&self, source: &Path, cell: &Arc<OnceCell<CachedModule>>) {
    let mut entries = self.entries.lock().await;
    if let Some(current) = entries.get(source)
      && Arc::ptr_eq(current, cell)
    {
      entries.remove(source);
    }
  }

  pub async fn invalidate(&self, source: &Path) {
    self.entries.lock().await.remove(source);
  }
}

pub(crate) struct DevShared {
  bundler: Arc<dyn BundlerService>,
  routes_dir: PathBuf,
  extensions: Vec<String>,
  site: std::sync::RwLock<Arc<DevSite>>,
  cache: CompileCache,
}

impl DevShared {
  fn boot(
    bundler: Arc<dyn BundlerService>,
    routes_dir: PathBuf,
    extensions: Vec<String>,
  ) -> Result<Arc<Self>, PyraError> {
    let site = Arc::new(DevSite::scan(&routes_dir, &extensions)?);
    Ok(Arc::new(Self {
      bundler,
      routes_dir,
      extensions,
      site: std::sync::RwLock::new(site),
      cache: CompileCache::new(),
    }))
  }

  pub(crate) fn site(&self) -> Arc<DevSite> {
    match self.site.read() {
      Ok(guard) => guard.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  fn rescan(&self) -> Result<(), PyraError> {
    let site = Arc::new(DevSite::scan(&self.routes_dir, &self.extensions)?);
    match self.site.write() {
      Ok(mut guard) => *guard = site,
      Err(poisoned) => *poisoned.into_inner() = site,
    }
    Ok(())
  }

  async fn compile(&self, source: PathBuf) -> Result<Arc<ModuleExports>, PyraError> {
    let compiled = self.cache.get_or_compile(&*self.bundler, source).await?;
    Ok(compiled.module.clone())
  }
}

impl SiteSource for DevShared {
  fn graph(&self) -> Arc<RouteGraph> {
    self.site().graph.clone()
  }
}

pub(crate) struct DevProvider {
  shared: Arc<DevShared>,
}

impl ModuleProvider for DevProvider {
  fn page_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move { shared.compile(route.file_path.clone()).await })
  }

  fn api_module(&self, route: Arc<Route>) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move { shared.compile(route.file_path.clone()).await })
  }

  fn layout_module(&self, id: String) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move {
      let path = shared
        .site()
        .layouts
        .get(&id)
        .cloned()
        .ok_or_else(|| PyraError::compile(format!("no layout at \"{id}\"")))?;
      shared.compile(path).await
    })
  }

  fn middleware_module(&self, path: PathBuf) -> BoxFuture<Result<Arc<ModuleExports>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move { shared.compile(path).await })
  }

  fn error_module(&self, id: String) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move {
      match shared.site().error_overlays.get(&id).cloned() {
        Some(path) => Ok(Some(shared.compile(path).await?)),
        None => Ok(None),
      }
    })
  }

  fn not_found_module(&self) -> BoxFuture<Result<Option<Arc<ModuleExports>>, PyraError>> {
    let shared = self.shared.clone();
    Box::pin(async move {
      match shared.site().not_found.clone() {
        Some(path) => Ok(Some(shared.compile(path).await?)),
        None => Ok(None),
      }
    })
  }

  fn prerendered_html(&self, _route: &Route, _path: &str) -> Option<PathBuf> {
    None
  }

  fn spa_shell(&self) -> Option<PathBuf> {
    None
  }

  fn client_assets(&self, route_id: &str) -> ClientAssets {
    let site = self.shared.site();
    if route_id == "/404" {
      return ClientAssets {
        entry: site.not_found.is_some().then(|| "/__pyra/client/notfound.js".to_string()),
        ..Default::default()
      };
    }
    let Some(route) = site.graph.lookup(route_id) else { return ClientAssets::default() };
    let layouts = route
      .layout_chain
      .iter()
      .map(|id| format!("/__pyra/client/layout_{}.js", sanitize_id(id)))
      .collect();
    ClientAssets {
      entry: Some(format!("/__pyra/client/{}.js", sanitize_id(route_id))),
      chunks: Vec::new(),
      css: Vec::new(),
      layouts,
    }
  }
}

/// Serve a compiled client module for the browser. Compiled on first
/// request through the same cache the pipeline uses.
async fn client_file(
  State(shared): State<Arc<DevShared>>,
  AxumPath(file): AxumPath<String>,
) -> axum::response::Response {
  let Some(slug) = file.strip_suffix(".js") else {
    return axum::http::StatusCode::NOT_FOUND.into_response();
  };
  let Some(source) = shared.site().client_sources.get(slug).cloned() else {
    return axum::http::StatusCode::NOT_FOUND.into_response();
  };
  match shared.cache.get_or_compile(&*shared.bundler, source).await {
    Ok(compiled) => match std::fs::read(&compiled.path) {
      Ok(contents) => (
        [
          ("Content-Type", "text/javascript; charset=utf-8"),
          ("Cache-Control", crate::assets::NO_CACHE),
        ],
        contents,
      )
        .into_response(),
      Err(_) => axum::http::StatusCode::NOT_FOUND.into_response(),
    },
    Err(err) => crate::error::AxumError(err).into_response(),
  }
}

/// The development server: rescans on change, compiles on demand, and runs
/// the same request pipeline as production.
pub struct DevServer {
  adapter: Arc<dyn UiAdapter>,
  bundler: Arc<dyn BundlerService>,
  options: DevOptions,
}

impl DevServer {
  pub fn new(
    adapter: Arc<dyn UiAdapter>,
    bundler: Arc<dyn BundlerService>,
    options: DevOptions,
  ) -> Self {
    Self { adapter, bundler, options }
  }

  pub async fn run(self) -> Result<(), PyraError> {
    let extensions = self.adapter.file_extensions();
    let shared =
      DevShared::boot(self.bundler.clone(), self.options.routes_dir.clone(), extensions)?;

    let mut options =
      PipelineOptions::new(Mode::Development, Arc::new(env_slice(&self.options.env_prefix)));
    options.default_render_mode = self.options.default_render_mode;
    options.base = self.options.base.clone();
    let pipeline = Pipeline::new(
      self.adapter.clone(),
      Arc::new(DevProvider { shared: shared.clone() }),
      options,
    );

    let _watcher = spawn_watcher(shared.clone())?;

    let static_roots: Vec<PathBuf> =
      self.options.public_dir.iter().filter(|p| p.is_dir()).cloned().collect();
    let client_router = Router::new()
      .route("/__pyra/client/{*file}", get(client_file))
      .with_state(shared.clone());
    let site: Arc<dyn SiteSource> = shared.clone();
    let router = build_router(pipeline, site, static_roots).merge(client_router);

    let addr = format!("{}:{}", self.options.host, self.options.port);
    println!("pyra dev server on http://{addr}");
    serve(router, &addr).await
  }
}

/// Watch the routes root; on change, debounce, drain, invalidate the
/// touched cache entries, and swap in a freshly scanned site.
fn spawn_watcher(shared: Arc<DevShared>) -> Result<RecommendedWatcher, PyraError> {
  let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<PathBuf>>(16);
  let mut watcher = RecommendedWatcher::new(
    move |res: Result<notify::Event, notify::Error>| {
      if let Ok(event) = res {
        let _ = tx.blocking_send(event.paths);
      }
    },
    notify::Config::default(),
  )
  .map_err(|e| PyraError::internal(format!("failed to create watcher: {e}")))?;
  watcher
    .watch(&shared.routes_dir, RecursiveMode::Recursive)
    .map_err(|e| PyraError::internal(format!("failed to watch routes dir: {e}")))?;

  tokio::spawn(async move {
    while let Some(paths) = rx.recv().await {
      // Debounce: wait 300ms, drain pending events
      tokio::time::sleep(Duration::from_millis(300)).await;
      let mut changed = paths;
      while let Ok(more) = rx.try_recv() {
        changed.extend(more);
      }
      for path in &changed {
        shared.cache.invalidate(path).await;
      }
      if let Err(err) = shared.rescan() {
        println!("pyra rescan error: {err}");
      }
    }
  });

  Ok(watcher)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingBundler {
    compiles: AtomicUsize,
  }

  impl BundlerService for CountingBundler {
    fn compile(&self, source: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>> {
      self.compiles.fetch_add(1, Ordering::SeqCst);
      Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(CompiledModule {
          path: source,
          exports: vec!["default".to_string()],
          module: Arc::new(ModuleExports::default()),
        })
      })
    }

    fn bundle(
      &self,
      _entries: Vec<pyra_core::BundleEntry>,
      _options: pyra_core::BundleOptions,
    ) -> BoxFuture<Result<pyra_core::BundleMetadata, PyraError>> {
      Box::pin(async { Ok(pyra_core::BundleMetadata::default()) })
    }

    fn load_module(&self, path: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>> {
      self.compile(path)
    }
  }

  #[tokio::test]
  async fn concurrent_compiles_of_one_entry_converge_to_one_build() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("page.tsx");
    std::fs::write(&source, "export default {}").expect("write");

    let bundler = Arc::new(CountingBundler { compiles: AtomicUsize::new(0) });
    let cache = Arc::new(CompileCache::new());

    let mut tasks = Vec::new();
    for _ in 0..8 {
      let cache = cache.clone();
      let bundler = bundler.clone();
      let source = source.clone();
      tasks.push(tokio::spawn(async move {
        cache.get_or_compile(&*bundler, source).await.expect("compile")
      }));
    }
    for task in tasks {
      task.await.expect("join");
    }
    assert_eq!(bundler.compiles.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn invalidation_forces_recompile() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("page.tsx");
    std::fs::write(&source, "export default {}").expect("write");

    let bundler = CountingBundler { compiles: AtomicUsize::new(0) };
    let cache = CompileCache::new();

    cache.get_or_compile(&bundler, source.clone()).await.expect("first");
    cache.get_or_compile(&bundler, source.clone()).await.expect("cached");
    assert_eq!(bundler.compiles.load(Ordering::SeqCst), 1);

    cache.invalidate(&source).await;
    cache.invalidate(&source).await; // repeated invalidation is safe
    cache.get_or_compile(&bundler, source.clone()).await.expect("recompiled");
    assert_eq!(bundler.compiles.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn failed_compile_is_not_cached() {
    struct FailingOnce {
      attempts: AtomicUsize,
    }
    impl BundlerService for FailingOnce {
      fn compile(&self, source: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
          if attempt == 0 {
            return Err(PyraError::compile("syntax error"));
          }
          Ok(CompiledModule {
            path: source,
            exports: Vec::new(),
            module: Arc::new(ModuleExports::default()),
          })
        })
      }
      fn bundle(
        &self,
        _entries: Vec<pyra_core::BundleEntry>,
        _options: pyra_core::BundleOptions,
      ) -> BoxFuture<Result<pyra_core::BundleMetadata, PyraError>> {
        Box::pin(async { Ok(pyra_core::BundleMetadata::default()) })
      }
      fn load_module(&self, path: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>> {
        self.compile(path)
      }
    }

    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("page.tsx");
    std::fs::write(&source, "export default {}").expect("write");

    let bundler = FailingOnce { attempts: AtomicUsize::new(0) };
    let cache = CompileCache::new();
    let err = cache.get_or_compile(&bundler, source.clone()).await.expect_err("fails");
    assert_eq!(err.code(), "COMPILE_ERROR");
    cache.get_or_compile(&bundler, source).await.expect("second attempt succeeds");
  }

  #[test]
  fn dev_site_scan_registers_client_sources() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let routes = tmp.path().join("routes");
    std::fs::create_dir_all(routes.join("blog/[slug]")).expect("mkdir");
    std::fs::write(routes.join("page.tsx"), "export default {}").expect("write");
    std::fs::write(routes.join("layout.tsx"), "export default {}").expect("write");
    std::fs::write(routes.join("404.tsx"), "export default {}").expect("write");
    std::fs::write(routes.join("blog/[slug]/page.tsx"), "export default {}").expect("write");

    let site = DevSite::scan(&routes, &["tsx".to_string()]).expect("scan");
    assert!(site.client_sources.contains_key("index"));
    assert!(site.client_sources.contains_key("blog_slug"));
    assert!(site.client_sources.contains_key("layout_index"));
    assert!(site.client_sources.contains_key("notfound"));
    assert!(site.graph.lookup("/blog/[slug]").is_some());
  }
}
