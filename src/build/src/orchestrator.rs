/* src/build/src/orchestrator.rs */

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use pyra_core::manifest::{BoundaryRef, ClientArtifacts, LayoutRef, PageArtifacts};
use pyra_core::pipeline::render::{Document, assemble_document};
use pyra_core::{
  AssetMeta, BundleMetadata, BundleOptions, BundlerService, ClientAssets, HTTP_METHODS, Manifest,
  MANIFEST_FILE, MANIFEST_VERSION, ModuleExports, PyraError, RenderMode, Route, RouteEntry,
  ScanOutcome, UiAdapter, resolve_render_mode, sanitize_id, scan,
};

use crate::assets_out::{copy_public, index_assets};
use crate::config::BuildConfig;
use crate::entries::{EntryPlan, NOT_FOUND_ENTRY, error_entry_name, layout_entry_name, plan_entries};
use crate::exports::detect_exports;
use crate::plugins::{BuildContext, BuildPlugin};
use crate::prerender::{PrerenderRoute, VariantOutcome, is_multi_variant, prerender_route};
use crate::ui::BuildProgress;

pub const SPA_FALLBACK_FILE: &str = "__spa.html";
const NOT_FOUND_ID: &str = "/404";

#[derive(Debug)]
pub struct BuildOutcome {
  pub manifest: Manifest,
  pub manifest_path: PathBuf,
  pub prerendered: u32,
}

/// Run the whole build: scan, two bundle passes, export detection,
/// prerendering, asset indexing, manifest emission, with plugin hooks
/// fired around the steps. Success and failure both end with a formatted
/// summary line.
pub async fn run_build(
  config: &BuildConfig,
  adapter: Arc<dyn UiAdapter>,
  bundler: Arc<dyn BundlerService>,
  plugins: &[Box<dyn BuildPlugin>],
) -> Result<BuildOutcome> {
  let mut progress = BuildProgress::start(&config.project_name);
  match execute(config, adapter, bundler, plugins, &mut progress).await {
    Ok(outcome) => {
      progress.finish(&outcome.manifest, outcome.prerendered);
      Ok(outcome)
    }
    Err(err) => {
      progress.failed(&err);
      Err(err)
    }
  }
}

async fn execute(
  config: &BuildConfig,
  adapter: Arc<dyn UiAdapter>,
  bundler: Arc<dyn BundlerService>,
  plugins: &[Box<dyn BuildPlugin>],
  progress: &mut BuildProgress,
) -> Result<BuildOutcome> {
  let mut config = config.clone();
  for plugin in plugins {
    plugin.config(&mut config).with_context(|| format!("plugin {} config hook", plugin.name()))?;
  }

  let ctx = BuildContext { config: &config, adapter_name: adapter.name() };
  for plugin in plugins {
    plugin.setup(&ctx).with_context(|| format!("plugin {} setup hook", plugin.name()))?;
  }

  progress.step("Preparing output directory");
  let client_dir = config.out_dir.join("client");
  let server_dir = config.out_dir.join("server");
  let _ = std::fs::remove_dir_all(&config.out_dir);
  std::fs::create_dir_all(client_dir.join("assets"))
    .with_context(|| format!("failed to create {}", client_dir.display()))?;
  std::fs::create_dir_all(&server_dir)
    .with_context(|| format!("failed to create {}", server_dir.display()))?;

  progress.step("Scanning routes");
  let outcome = scan(&config.routes_dir, &adapter.file_extensions())?;
  if outcome.root_missing {
    progress.note("no routes directory, building as a single-page application");
    for plugin in plugins {
      plugin.build_start(&ctx).with_context(|| format!("plugin {} buildStart hook", plugin.name()))?;
    }
    let mut spa = run_spa_build(&config, adapter.as_ref(), bundler.as_ref(), progress).await?;
    for plugin in plugins {
      plugin
        .build_end(&mut spa.manifest)
        .with_context(|| format!("plugin {} buildEnd hook", plugin.name()))?;
    }
    spa.manifest.write_to(&spa.manifest_path)?;
    return Ok(spa);
  }
  let pages = outcome.routes.iter().filter(|r| r.is_page()).count();
  let apis = outcome.routes.len() - pages;
  progress.artifact(&format!("{pages} pages \u{00b7} {apis} API routes"));

  for plugin in plugins {
    plugin.build_start(&ctx).with_context(|| format!("plugin {} buildStart hook", plugin.name()))?;
  }

  progress.step("Bundling");
  let entries_dir = config.out_dir.join(".entries");
  let plan = plan_entries(&outcome, adapter.as_ref(), pyra_core::DEFAULT_CONTAINER_ID, &entries_dir)?;

  let mut client_options = BundleOptions::browser(client_dir.clone());
  client_options.minify = config.minify;
  client_options.plugins = adapter.bundler_plugins();
  if let Some(target) = &config.target {
    client_options.target = target.clone();
  }
  let client_meta = bundler.bundle(plan.client.clone(), client_options).await?;
  progress.pass("client", client_meta.outputs.len(), total_bytes(&client_meta));

  let server_options = BundleOptions::node(server_dir.clone(), config.externals.clone());
  let server_meta = bundler.bundle(plan.server.clone(), server_options).await?;
  progress.pass("server", server_meta.outputs.len(), total_bytes(&server_meta));

  progress.step("Resolving routes");
  let mut route_plans = Vec::new();
  for route in &outcome.routes {
    route_plans.push(
      resolve_route(&config, bundler.as_ref(), &server_meta, route, &config.out_dir).await?,
    );
  }

  progress.step("Prerendering");
  let env = Arc::new(pyra_core::env_slice(&config.env_prefix));
  let mut entries: BTreeMap<String, RouteEntry> = BTreeMap::new();
  let mut any_spa = false;
  let mut prerendered_total = 0u32;

  for plan_route in &route_plans {
    let route = plan_route.route;
    let entry = match (route.is_page(), plan_route.mode) {
      (false, _) => RouteEntry::Api {
        pattern: route.pattern.clone(),
        server_module: plan_route.server_module.clone(),
        middleware: middleware_paths(route, &plan, &server_meta)?,
        methods: plan_route.methods.clone(),
      },
      (true, RenderMode::Spa) => {
        any_spa = true;
        RouteEntry::PageSpa {
          pattern: route.pattern.clone(),
          client: client_artifacts(&client_meta, &sanitize_id(&route.id)),
          middleware: middleware_paths(route, &plan, &server_meta)?,
        }
      }
      (true, RenderMode::Ssr) => RouteEntry::PageSsr {
        pattern: route.pattern.clone(),
        page: page_artifacts(route, plan_route, &plan, &client_meta, &server_meta)?,
        cache: plan_route.cache.clone(),
      },
      (true, RenderMode::Ssg) => {
        let module = plan_route
          .module
          .as_ref()
          .ok_or_else(|| PyraError::internal("ssg route resolved without its module"))?;
        let layouts = load_layout_components(bundler.as_ref(), &server_meta, route, &config.out_dir)
          .await?;
        let page = page_artifacts(route, plan_route, &plan, &client_meta, &server_meta)?;
        let assets = prefixed_assets(&config.base, &page);
        let input = PrerenderRoute {
          route,
          module,
          layouts,
          assets: &assets,
          container_id: pyra_core::DEFAULT_CONTAINER_ID,
          env: env.clone(),
          client_dir: &client_dir,
        };
        let outcomes = prerender_route(&input, adapter.as_ref()).await?;
        let mut written = Vec::new();
        for variant in &outcomes {
          match variant {
            VariantOutcome::Written { pathname, html_path } => {
              progress.artifact(&format!("{pathname} \u{2192} client/{html_path}"));
              written.push(html_path.clone());
            }
            VariantOutcome::Failed { pathname, reason } => {
              progress.warn(&format!("prerender of {pathname} failed ({reason}); serving via SSR"));
            }
          }
        }
        prerendered_total += written.len() as u32;
        match (written.as_slice(), is_multi_variant(module)) {
          ([], _) => RouteEntry::PageSsr {
            pattern: route.pattern.clone(),
            page,
            cache: plan_route.cache.clone(),
          },
          ([single], false) => RouteEntry::PageSsgSingle {
            pattern: route.pattern.clone(),
            page,
            html: single.clone(),
            cache: plan_route.cache.clone(),
          },
          (many, _) => RouteEntry::PageSsgMulti {
            pattern: route.pattern.clone(),
            page,
            variants: many.len() as u32,
            cache: plan_route.cache.clone(),
          },
        }
      }
    };
    entries.insert(route.id.clone(), entry);
  }

  if let Some(not_found_entry) = not_found_manifest_entry(&outcome, &client_meta, &server_meta) {
    entries.insert(NOT_FOUND_ID.to_string(), not_found_entry);
  }

  let spa_fallback = if any_spa {
    let shell = assemble_document(&Document {
      shell: adapter.document_shell(),
      container_id: pyra_core::DEFAULT_CONTAINER_ID,
      head_tags: &[],
      assets: &ClientAssets::default(),
      body_html: "",
      hydration_json: None,
      hydration_script: None,
    });
    std::fs::write(client_dir.join(SPA_FALLBACK_FILE), shell)
      .with_context(|| format!("failed to write {SPA_FALLBACK_FILE}"))?;
    progress.artifact(SPA_FALLBACK_FILE);
    Some(SPA_FALLBACK_FILE.to_string())
  } else {
    None
  };

  if let Some(public_dir) = &config.public_dir {
    let copied = copy_public(public_dir, &client_dir)?;
    progress.artifact(&format!("{copied} public files"));
  }

  // synthesized entries are build scaffolding, not output
  let _ = std::fs::remove_dir_all(&entries_dir);

  progress.step("Writing manifest");
  let assets = index_assets(&client_dir)?;
  let mut manifest = Manifest {
    version: MANIFEST_VERSION,
    adapter: adapter.name().to_string(),
    base: config.base.clone(),
    built_at: unix_millis(),
    default_render_mode: config.default_render_mode,
    routes: entries,
    assets,
    spa_fallback,
  };
  for plugin in plugins {
    plugin
      .build_end(&mut manifest)
      .with_context(|| format!("plugin {} buildEnd hook", plugin.name()))?;
  }
  let manifest_path = config.out_dir.join(MANIFEST_FILE);
  manifest.write_to(&manifest_path)?;
  progress.artifact(MANIFEST_FILE);

  Ok(BuildOutcome { manifest, manifest_path, prerendered: prerendered_total })
}

fn total_bytes(metadata: &BundleMetadata) -> u64 {
  metadata.outputs.iter().map(|o| o.bytes).sum()
}

struct RoutePlan<'a> {
  route: &'a Route,
  server_module: String,
  mode: RenderMode,
  methods: Vec<String>,
  module: Option<Arc<ModuleExports>>,
  cache: Option<pyra_core::CacheDirectives>,
}

/// Read a route's exports from the server-pass metadata (falling back to
/// the source-level lexer), then resolve its render mode, importing the
/// compiled module when an export influences it.
async fn resolve_route<'a>(
  config: &BuildConfig,
  bundler: &dyn BundlerService,
  server_meta: &BundleMetadata,
  route: &'a Route,
  out_dir: &std::path::Path,
) -> Result<RoutePlan<'a>> {
  let entry_name = sanitize_id(&route.id);
  let output = server_meta
    .output_for_entry(&entry_name)
    .ok_or_else(|| PyraError::compile(format!("no server output for route \"{}\"", route.id)))?;
  let mut export_names = output.exports.clone();
  if export_names.is_empty()
    && let Ok(source) = std::fs::read_to_string(&route.file_path)
  {
    export_names = detect_exports(&source);
  }
  let server_module = format!("server/{}", output.path);

  if route.is_api() {
    let methods = HTTP_METHODS
      .iter()
      .filter(|m| export_names.iter().any(|e| e == *m))
      .map(|m| (*m).to_string())
      .collect();
    return Ok(RoutePlan { route, server_module, mode: RenderMode::Ssr, methods, module: None, cache: None });
  }

  let influences_mode = export_names.iter().any(|e| e == "render" || e == "prerender");
  let has_cache = export_names.iter().any(|e| e == "cache");
  let mut module = None;
  let mut mode = config.default_render_mode;
  let mut cache = None;
  if influences_mode || has_cache || config.default_render_mode == RenderMode::Ssg {
    let compiled = bundler.load_module(out_dir.join(&server_module)).await?;
    mode = resolve_render_mode(&compiled.module, config.default_render_mode);
    cache = compiled.module.cache.clone();
    module = Some(compiled.module);
  }
  Ok(RoutePlan { route, server_module, mode, methods: Vec::new(), module, cache })
}

fn client_artifacts(client_meta: &BundleMetadata, entry_name: &str) -> ClientArtifacts {
  match client_meta.output_for_entry(entry_name) {
    Some(output) => ClientArtifacts {
      client_entry: Some(output.path.clone()),
      client_chunks: client_meta.chunks_of(output),
      css: output.css.clone(),
    },
    None => ClientArtifacts::default(),
  }
}

fn page_artifacts(
  route: &Route,
  plan_route: &RoutePlan<'_>,
  plan: &EntryPlan,
  client_meta: &BundleMetadata,
  server_meta: &BundleMetadata,
) -> Result<PageArtifacts> {
  let mut layouts = Vec::new();
  for layout_id in &route.layout_chain {
    let name = layout_entry_name(layout_id);
    let server = server_meta
      .output_for_entry(&name)
      .ok_or_else(|| PyraError::compile(format!("no server output for layout \"{layout_id}\"")))?;
    layouts.push(LayoutRef {
      id: layout_id.clone(),
      server: format!("server/{}", server.path),
      client: client_meta.output_for_entry(&name).map(|o| o.path.clone()),
    });
  }

  let error_boundary = match &route.error_boundary {
    Some(boundary_id) => {
      let name = error_entry_name(boundary_id);
      let server = server_meta.output_for_entry(&name).ok_or_else(|| {
        PyraError::compile(format!("no server output for error overlay \"{boundary_id}\""))
      })?;
      Some(BoundaryRef {
        id: boundary_id.clone(),
        server: format!("server/{}", server.path),
        client: client_meta.output_for_entry(&name).map(|o| o.path.clone()),
      })
    }
    None => None,
  };

  Ok(PageArtifacts {
    server_module: plan_route.server_module.clone(),
    client: client_artifacts(client_meta, &sanitize_id(&route.id)),
    layouts,
    middleware: middleware_paths(route, plan, server_meta)?,
    error_boundary,
  })
}

fn middleware_paths(
  route: &Route,
  plan: &EntryPlan,
  server_meta: &BundleMetadata,
) -> Result<Vec<String>> {
  route
    .middleware_chain
    .iter()
    .map(|source| {
      let name = plan.middleware_names.get(source).ok_or_else(|| {
        PyraError::compile(format!("middleware {} missing from entry plan", source.display()))
      })?;
      let output = server_meta.output_for_entry(name).ok_or_else(|| {
        PyraError::compile(format!("no server output for middleware {}", source.display()))
      })?;
      Ok(format!("server/{}", output.path))
    })
    .collect()
}

/// Client asset URLs as the production server will emit them: manifest
/// paths prefixed with the configured base.
fn prefixed_assets(base: &str, page: &PageArtifacts) -> ClientAssets {
  let base = base.trim_end_matches('/');
  let prefix = |p: &str| format!("{base}/{p}");
  ClientAssets {
    entry: page.client.client_entry.as_deref().map(prefix),
    chunks: page.client.client_chunks.iter().map(|p| prefix(p)).collect(),
    css: page.client.css.iter().map(|p| prefix(p)).collect(),
    layouts: page.layouts.iter().filter_map(|l| l.client.as_deref()).map(prefix).collect(),
  }
}

async fn load_layout_components(
  bundler: &dyn BundlerService,
  server_meta: &BundleMetadata,
  route: &Route,
  out_dir: &std::path::Path,
) -> Result<Vec<pyra_core::Component>> {
  let mut components = Vec::new();
  for layout_id in &route.layout_chain {
    let name = layout_entry_name(layout_id);
    let Some(output) = server_meta.output_for_entry(&name) else { continue };
    let compiled = bundler.load_module(out_dir.join("server").join(&output.path)).await?;
    if let Some(component) = &compiled.module.component {
      components.push(component.clone());
    }
  }
  Ok(components)
}

fn not_found_manifest_entry(
  outcome: &ScanOutcome,
  client_meta: &BundleMetadata,
  server_meta: &BundleMetadata,
) -> Option<RouteEntry> {
  outcome.not_found.as_ref()?;
  let server = server_meta.output_for_entry(NOT_FOUND_ENTRY)?;
  Some(RouteEntry::PageSsr {
    pattern: NOT_FOUND_ID.to_string(),
    page: PageArtifacts {
      server_module: format!("server/{}", server.path),
      client: client_artifacts(client_meta, NOT_FOUND_ENTRY),
      layouts: Vec::new(),
      middleware: Vec::new(),
      error_boundary: None,
    },
    cache: None,
  })
}

/// SPA build path, taken when the routes directory is absent: one client
/// bundle from the configured entry plus the fallback shell.
async fn run_spa_build(
  config: &BuildConfig,
  adapter: &dyn UiAdapter,
  bundler: &dyn BundlerService,
  progress: &BuildProgress,
) -> Result<BuildOutcome> {
  let Some(spa_entry) = &config.spa_entry else {
    bail!(
      "routes directory {} not found and build.spa_entry is not configured",
      config.routes_dir.display()
    );
  };

  let client_dir = config.out_dir.join("client");
  let mut options = BundleOptions::browser(client_dir.clone());
  options.minify = config.minify;
  options.plugins = adapter.bundler_plugins();
  let metadata = bundler
    .bundle(
      vec![pyra_core::BundleEntry { name: "app".to_string(), source: spa_entry.clone() }],
      options,
    )
    .await?;
  progress.pass("client", metadata.outputs.len(), total_bytes(&metadata));

  let entry_url = metadata.output_for_entry("app").map(|o| {
    format!("{}/{}", config.base.trim_end_matches('/'), o.path)
  });
  let shell = assemble_document(&Document {
    shell: adapter.document_shell(),
    container_id: pyra_core::DEFAULT_CONTAINER_ID,
    head_tags: &[],
    assets: &ClientAssets::default(),
    body_html: "",
    hydration_json: None,
    hydration_script: entry_url
      .as_deref()
      .map(|url| adapter.hydration_script(url, pyra_core::DEFAULT_CONTAINER_ID, &[])),
  });
  std::fs::write(client_dir.join(SPA_FALLBACK_FILE), &shell)
    .with_context(|| format!("failed to write {SPA_FALLBACK_FILE}"))?;
  std::fs::write(client_dir.join("index.html"), &shell)
    .context("failed to write index.html")?;

  if let Some(public_dir) = &config.public_dir {
    copy_public(public_dir, &client_dir)?;
  }

  let assets: BTreeMap<String, AssetMeta> = index_assets(&client_dir)?;
  let manifest = Manifest {
    version: MANIFEST_VERSION,
    adapter: adapter.name().to_string(),
    base: config.base.clone(),
    built_at: unix_millis(),
    default_render_mode: RenderMode::Spa,
    routes: BTreeMap::new(),
    assets,
    spa_fallback: Some(SPA_FALLBACK_FILE.to_string()),
  };
  Ok(BuildOutcome {
    manifest,
    manifest_path: config.out_dir.join(MANIFEST_FILE),
    prerendered: 0,
  })
}

fn unix_millis() -> u64 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
