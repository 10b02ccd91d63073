/* src/core/src/pipeline/fallback.rs */

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{Ctx, Request, RequestContext};
use crate::errors::PyraError;
use crate::module::ModuleExports;
use crate::response::Response;
use crate::route::{RenderMode, Route, RouteKind};

use super::render;
use super::Pipeline;

/// Synthetic route standing in for the custom 404 page: no overlays apply
/// to it (it is out of any route's scope).
fn not_found_route() -> Arc<Route> {
  Arc::new(Route {
    id: "/404".to_string(),
    pattern: "/404".to_string(),
    kind: RouteKind::Page,
    file_path: std::path::PathBuf::new(),
    params: Vec::new(),
    layout_chain: Vec::new(),
    middleware_chain: Vec::new(),
    error_boundary: None,
    render_mode: RenderMode::Ssr,
  })
}

/// Match miss: render the custom not-found page when one was discovered,
/// otherwise the built-in body. Layouts and middleware never wrap a 404.
pub(super) async fn not_found(pipeline: &Pipeline, request: &Request) -> Response {
  let module = match pipeline.provider().not_found_module().await {
    Ok(Some(module)) if module.component.is_some() => module,
    _ => return builtin_not_found(),
  };

  let ctx = RequestContext::new(
    request,
    HashMap::new(),
    "/404",
    pipeline.options().mode,
    pipeline.options().env.clone(),
  );
  match render::render_page(pipeline, &not_found_route(), &ctx, &module).await {
    Ok(response) => response.with_status(404),
    Err(_) => builtin_not_found(),
  }
}

pub(super) fn builtin_not_found() -> Response {
  Response::html(
    "<!DOCTYPE html><html><head><title>404</title></head>\
     <body><h1>404</h1><p>This page could not be found.</p></body></html>",
  )
  .with_status(404)
}

fn builtin_error(status: u16, message: &str) -> Response {
  Response::html(format!(
    "<!DOCTYPE html><html><head><title>{status}</title></head>\
     <body><h1>{status}</h1><p>{message}</p></body></html>",
  ))
  .with_status(status)
}

/// Is `candidate` the same directory as `scope`, or an ancestor of it?
fn is_ancestor_or_self(candidate: &str, scope: &str) -> bool {
  candidate == "/" || candidate == scope || scope.starts_with(&format!("{candidate}/"))
}

/// Error boundary: render the nearest ancestor error overlay as a page.
/// Layouts below the boundary do not wrap the error page; production
/// strips the stack and genericizes non-exposed messages.
pub(super) async fn error_page(
  pipeline: &Pipeline,
  route: &Arc<Route>,
  ctx: &Ctx,
  err: &PyraError,
) -> Response {
  let status = err.status();
  let dev = pipeline.options().mode.is_dev();
  let message = if dev || err.is_exposed() {
    err.message().to_string()
  } else {
    "Internal Server Error".to_string()
  };
  let stack = dev.then(|| format!("{err}"));

  let Some(boundary_id) = &route.error_boundary else {
    return builtin_error(status, &message);
  };
  let overlay: Arc<ModuleExports> = match pipeline.provider().error_module(boundary_id.clone()).await
  {
    Ok(Some(module)) if module.component.is_some() => module,
    _ => return builtin_error(status, &message),
  };
  let Some(component) = &overlay.component else {
    return builtin_error(status, &message);
  };

  let mut data = serde_json::Map::new();
  data.insert("message".to_string(), serde_json::Value::String(message.clone()));
  data.insert("statusCode".to_string(), serde_json::Value::from(status));
  data.insert("pathname".to_string(), serde_json::Value::String(ctx.url.path.clone()));
  if let Some(stack) = &stack {
    data.insert("stack".to_string(), serde_json::Value::String(stack.clone()));
  }
  let data = serde_json::Value::Object(data);

  // Only layouts at or above the boundary wrap the error page.
  let mut layouts = Vec::new();
  for layout_id in &route.layout_chain {
    if !is_ancestor_or_self(layout_id, boundary_id) {
      continue;
    }
    if let Ok(layout) = pipeline.provider().layout_module(layout_id.clone()).await
      && let Some(layout_component) = &layout.component
    {
      layouts.push(layout_component.clone());
    }
  }

  let mut rcx =
    crate::adapter::RenderContext::new(ctx.url.full(), ctx.params.clone(), layouts);
  let body_html = match pipeline.adapter().render_to_html(component, &data, &mut rcx) {
    Ok(html) => html,
    Err(_) => return builtin_error(status, &message),
  };

  let assets = crate::provider::ClientAssets::default();
  let html = render::assemble_document(&render::Document {
    shell: pipeline.adapter().document_shell(),
    container_id: &pipeline.options().container_id,
    head_tags: rcx.head(),
    assets: &assets,
    body_html: &body_html,
    hydration_json: Some(data.to_string()),
    hydration_script: None,
  });
  Response::html(html).with_status(status)
}
