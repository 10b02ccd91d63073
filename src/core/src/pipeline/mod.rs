/* src/core/src/pipeline/mod.rs */

mod api;
mod fallback;
pub mod render;


use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::adapter::{DEFAULT_CONTAINER_ID, UiAdapter};
use crate::context::{Ctx, Mode, Request, RequestContext};
use crate::errors::PyraError;
use crate::matcher::RouteGraph;
use crate::middleware::{flush_cookies, run_chain};
use crate::module::{MiddlewareFn, NextFn, resolve_render_mode};
use crate::provider::ModuleProvider;
use crate::response::Response;
use crate::route::{CacheDirectives, RenderMode, Route, RouteKind};

/// Pipeline-wide knobs shared by the dev and production servers.
#[derive(Clone)]
pub struct PipelineOptions {
  pub mode: Mode,
  pub env: Arc<HashMap<String, String>>,
  pub default_render_mode: RenderMode,
  /// URL prefix stripped before matching. `/` means none.
  pub base: String,
  pub container_id: String,
}

impl PipelineOptions {
  pub fn new(mode: Mode, env: Arc<HashMap<String, String>>) -> Self {
    Self {
      mode,
      env,
      default_render_mode: RenderMode::Ssr,
      base: "/".to_string(),
      container_id: DEFAULT_CONTAINER_ID.to_string(),
    }
  }
}

/// The request pipeline shared by the development and production servers.
/// Per request: match, build context, assemble middleware, invoke the
/// terminal for the route type, catch once at the outermost frame, then
/// finalize cookies and caching headers.
#[derive(Clone)]
pub struct Pipeline {
  adapter: Arc<dyn UiAdapter>,
  provider: Arc<dyn ModuleProvider>,
  options: PipelineOptions,
}

impl Pipeline {
  pub fn new(
    adapter: Arc<dyn UiAdapter>,
    provider: Arc<dyn ModuleProvider>,
    options: PipelineOptions,
  ) -> Self {
    Self { adapter, provider, options }
  }

  pub fn adapter(&self) -> &Arc<dyn UiAdapter> {
    &self.adapter
  }

  pub fn provider(&self) -> &Arc<dyn ModuleProvider> {
    &self.provider
  }

  pub fn options(&self) -> &PipelineOptions {
    &self.options
  }

  pub async fn handle(&self, graph: &RouteGraph, request: Request) -> Response {
    let Some(path) = self.strip_base(&request.url.path) else {
      return fallback::not_found(self, &request).await;
    };

    let Some(matched) = graph.match_path(&path) else {
      return fallback::not_found(self, &request).await;
    };
    let route = matched.route;

    let ctx = RequestContext::new(
      &request,
      matched.params,
      route.id.clone(),
      self.options.mode,
      self.options.env.clone(),
    );

    // Collect middleware tables up front; a compile failure surfaces the
    // same way a thrown middleware does.
    let mut chain: Vec<MiddlewareFn> = Vec::new();
    for mw_path in &route.middleware_chain {
      match self.provider.middleware_module(mw_path.clone()).await {
        Ok(module) => {
          if let Some(mw) = &module.middleware {
            chain.push(mw.clone());
          }
        }
        Err(err) => return self.fail(&route, &ctx, err).await,
      }
    }

    let cache_slot: Arc<OnceLock<CacheDirectives>> = Arc::new(OnceLock::new());
    let terminal = self.terminal(route.clone(), ctx.clone(), cache_slot.clone());

    let mut response = match run_chain(ctx.clone(), chain, terminal).await {
      Ok(response) => response,
      Err(err) => self.fail(&route, &ctx, err).await,
    };

    flush_cookies(&ctx, &mut response);
    if let Some(cache) = cache_slot.get() {
      response.ensure_header("Cache-Control", &cache.header_value());
    }
    response
  }

  /// Terminal handler appended after the middleware chain, chosen by route
  /// type and render mode.
  fn terminal(
    &self,
    route: Arc<Route>,
    ctx: Ctx,
    cache_slot: Arc<OnceLock<CacheDirectives>>,
  ) -> NextFn {
    let pipeline = self.clone();
    Box::new(move || {
      Box::pin(async move {
        match route.kind {
          RouteKind::Api => {
            let module = pipeline.provider.api_module(route.clone()).await?;
            Ok(api::dispatch(&pipeline, &ctx, &module).await)
          }
          RouteKind::Page => {
            let module = pipeline.provider.page_module(route.clone()).await?;
            if let Some(cache) = &module.cache {
              let _ = cache_slot.set(cache.clone());
            }
            let mode = resolve_render_mode(&module, pipeline.options.default_render_mode);
            match mode {
              RenderMode::Ssr => render::render_page(&pipeline, &route, &ctx, &module).await,
              RenderMode::Ssg => render::serve_ssg(&pipeline, &route, &ctx, &module).await,
              RenderMode::Spa => render::serve_spa(&pipeline, &route),
            }
          }
        }
      })
    })
  }

  /// The single outermost catch: API routes answer JSON, page routes go to
  /// the nearest error boundary.
  async fn fail(&self, route: &Arc<Route>, ctx: &Ctx, err: PyraError) -> Response {
    match route.kind {
      RouteKind::Api => api::error_response(self.options.mode, &err),
      RouteKind::Page => fallback::error_page(self, route, ctx, &err).await,
    }
  }

  /// Strip the configured base prefix. `None` means the path is outside
  /// the application entirely.
  fn strip_base(&self, path: &str) -> Option<String> {
    let base = self.options.base.trim_end_matches('/');
    if base.is_empty() {
      return Some(path.to_string());
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
      return Some("/".to_string());
    }
    if !rest.starts_with('/') {
      return None;
    }
    Some(rest.to_string())
  }
}
