/* src/core/src/pipeline/render.rs */

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::{CONTAINER_TOKEN, DATA_SCRIPT_ID, HEAD_MARKER, OUTLET_MARKER, RenderContext};
use crate::context::Ctx;
use crate::errors::PyraError;
use crate::escape::escape_inline_json;
use crate::module::{LoadOutcome, ModuleExports};
use crate::provider::ClientAssets;
use crate::response::Response;
use crate::route::Route;

use super::Pipeline;

/// Inputs for assembling a full HTML document. The build orchestrator's
/// prerender loop uses the same assembler as the runtime, which is what
/// keeps build and prod output identical.
pub struct Document<'a> {
  pub shell: String,
  pub container_id: &'a str,
  pub head_tags: &'a [String],
  pub assets: &'a ClientAssets,
  pub body_html: &'a str,
  pub hydration_json: Option<String>,
  pub hydration_script: Option<String>,
}

/// Substitute the container token, inject head tags and asset preloads,
/// place the body in the outlet, and append the hydration data/script pair
/// before `</body>`.
pub fn assemble_document(doc: &Document<'_>) -> String {
  let mut head = String::new();
  for tag in doc.head_tags {
    head.push_str(tag);
    head.push('\n');
  }
  for css in &doc.assets.css {
    head.push_str(&format!("<link rel=\"stylesheet\" href=\"{css}\">\n"));
  }
  for chunk in &doc.assets.chunks {
    head.push_str(&format!("<link rel=\"modulepreload\" href=\"{chunk}\">\n"));
  }

  let mut html = doc
    .shell
    .replace(CONTAINER_TOKEN, doc.container_id)
    .replace(HEAD_MARKER, head.trim_end())
    .replace(OUTLET_MARKER, doc.body_html);

  let mut scripts = String::new();
  if let Some(json) = &doc.hydration_json {
    scripts.push_str(&format!(
      "<script type=\"application/json\" id=\"{DATA_SCRIPT_ID}\">{}</script>",
      escape_inline_json(json)
    ));
  }
  if let Some(module) = &doc.hydration_script {
    scripts.push_str(&format!("<script type=\"module\">{module}</script>"));
  }

  if let Some(pos) = html.rfind("</body>") {
    html.insert_str(pos, &scripts);
  } else {
    html.push_str(&scripts);
  }
  html
}

/// Hydration payload: the load result merged with the matched params.
pub fn hydration_data(data: &serde_json::Value, params: &HashMap<String, String>) -> String {
  let mut object = match data {
    serde_json::Value::Object(map) => map.clone(),
    serde_json::Value::Null => serde_json::Map::new(),
    other => {
      let mut map = serde_json::Map::new();
      map.insert("data".to_string(), other.clone());
      map
    }
  };
  for (key, value) in params {
    object.insert(key.clone(), serde_json::Value::String(value.clone()));
  }
  serde_json::Value::Object(object).to_string()
}

/// SSR terminal: run the loader, render through the adapter, assemble the
/// full document.
pub(super) async fn render_page(
  pipeline: &Pipeline,
  route: &Arc<Route>,
  ctx: &Ctx,
  module: &Arc<ModuleExports>,
) -> Result<Response, PyraError> {
  let mut data = serde_json::Value::Null;
  if let Some(load) = &module.load {
    match load(ctx.clone()).await? {
      LoadOutcome::Response(response) => return Ok(response),
      LoadOutcome::Data(value) => data = value,
    }
  }

  let Some(component) = &module.component else {
    return Err(PyraError::render(format!("page module for \"{}\" has no default export", route.id)));
  };

  let mut layouts = Vec::new();
  for layout_id in &route.layout_chain {
    let layout = pipeline.provider().layout_module(layout_id.clone()).await?;
    if let Some(layout_component) = &layout.component {
      layouts.push(layout_component.clone());
    }
  }

  let mut rcx = RenderContext::new(ctx.url.full(), ctx.params.clone(), layouts);
  let body_html = pipeline.adapter().render_to_html(component, &data, &mut rcx)?;

  let assets = pipeline.provider().client_assets(&route.id);
  let hydration_script = assets.entry.as_ref().map(|entry| {
    pipeline.adapter().hydration_script(entry, &pipeline.options().container_id, &assets.layouts)
  });

  let html = assemble_document(&Document {
    shell: pipeline.adapter().document_shell(),
    container_id: &pipeline.options().container_id,
    head_tags: rcx.head(),
    assets: &assets,
    body_html: &body_html,
    hydration_json: Some(hydration_data(&data, &ctx.params)),
    hydration_script,
  });
  Ok(Response::html(html))
}

/// SSG terminal: serve the prebuilt HTML when it exists, otherwise render.
pub(super) async fn serve_ssg(
  pipeline: &Pipeline,
  route: &Arc<Route>,
  ctx: &Ctx,
  module: &Arc<ModuleExports>,
) -> Result<Response, PyraError> {
  if let Some(path) = pipeline.provider().prerendered_html(route, &ctx.url.path)
    && let Ok(html) = std::fs::read_to_string(&path)
  {
    return Ok(Response::html(html));
  }
  render_page(pipeline, route, ctx, module).await
}

/// SPA terminal: the generic fallback shell. The build writes one to disk;
/// without it (dev) an empty shell is assembled on the fly.
pub(super) fn serve_spa(pipeline: &Pipeline, route: &Arc<Route>) -> Result<Response, PyraError> {
  if let Some(path) = pipeline.provider().spa_shell()
    && let Ok(html) = std::fs::read_to_string(&path)
  {
    return Ok(Response::html(html));
  }

  let assets = pipeline.provider().client_assets(&route.id);
  let hydration_script = assets.entry.as_ref().map(|entry| {
    pipeline.adapter().hydration_script(entry, &pipeline.options().container_id, &assets.layouts)
  });
  let html = assemble_document(&Document {
    shell: pipeline.adapter().document_shell(),
    container_id: &pipeline.options().container_id,
    head_tags: &[],
    assets: &assets,
    body_html: "",
    hydration_json: Some("{}".to_string()),
    hydration_script,
  });
  Ok(Response::html(html))
}
