/* src/build/src/prerender.rs */

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pyra_core::module::LoadOutcome;
use pyra_core::pipeline::render::{Document, assemble_document, hydration_data};
use pyra_core::route::{html_output_path, substitute_params};
use pyra_core::{
  ClientAssets, Component, ModuleExports, Prerender, RenderContext, RequestContext, Route,
  UiAdapter,
};

/// One prerendered variant: the concrete request path and where its HTML
/// landed (relative to the client dir), or why it was skipped.
#[derive(Debug)]
pub enum VariantOutcome {
  Written { pathname: String, html_path: String },
  Failed { pathname: String, reason: String },
}

/// Inputs for prerendering one SSG route. Assets are the same URLs the
/// production server will inject, which keeps prerendered HTML identical
/// to a runtime render of the same URL.
pub struct PrerenderRoute<'a> {
  pub route: &'a Route,
  pub module: &'a Arc<ModuleExports>,
  pub layouts: Vec<Component>,
  pub assets: &'a ClientAssets,
  pub container_id: &'a str,
  pub env: Arc<HashMap<String, String>>,
  pub client_dir: &'a Path,
}

/// Param sets to prerender: the paths generator when exported, otherwise a
/// single unparameterized render.
pub fn variant_params(module: &ModuleExports) -> Vec<HashMap<String, String>> {
  match &module.prerender {
    Some(prerender) => {
      let variants = prerender.variants();
      if variants.is_empty() { vec![HashMap::new()] } else { variants }
    }
    None => vec![HashMap::new()],
  }
}

pub fn is_multi_variant(module: &ModuleExports) -> bool {
  matches!(module.prerender, Some(Prerender::Paths(_)))
}

/// Render every variant of one SSG route to disk. A failing variant is
/// reported, not fatal; the route serves via SSR at request time instead.
pub async fn prerender_route(input: &PrerenderRoute<'_>, adapter: &dyn UiAdapter) -> Result<Vec<VariantOutcome>> {
  let mut outcomes = Vec::new();

  for params in variant_params(input.module) {
    let pathname = substitute_params(&input.route.pattern, &params);
    match render_variant(input, adapter, &pathname, params).await {
      Ok(html) => {
        let html_path = html_output_path(&pathname);
        let target = input.client_dir.join(&html_path);
        if let Some(parent) = target.parent() {
          std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&target, html)
          .with_context(|| format!("failed to write {}", target.display()))?;
        outcomes.push(VariantOutcome::Written { pathname, html_path });
      }
      Err(reason) => outcomes.push(VariantOutcome::Failed { pathname, reason }),
    }
  }

  Ok(outcomes)
}

/// One variant through the same load/render/assemble path the runtime
/// uses, against a synthetic production GET context.
async fn render_variant(
  input: &PrerenderRoute<'_>,
  adapter: &dyn UiAdapter,
  pathname: &str,
  params: HashMap<String, String>,
) -> std::result::Result<String, String> {
  let ctx =
    RequestContext::synthetic(pathname, params, input.route.id.clone(), input.env.clone());

  let mut data = serde_json::Value::Null;
  if let Some(load) = &input.module.load {
    match load(ctx.clone()).await {
      Ok(LoadOutcome::Data(value)) => data = value,
      Ok(LoadOutcome::Response(_)) => {
        return Err("load returned a response during prerender".to_string());
      }
      Err(err) => return Err(err.to_string()),
    }
  }

  let component = input
    .module
    .component
    .as_ref()
    .ok_or_else(|| format!("page module for \"{}\" has no default export", input.route.id))?;

  let mut rcx = RenderContext::new(pathname, ctx.params.clone(), input.layouts.clone());
  let body_html =
    adapter.render_to_html(component, &data, &mut rcx).map_err(|e| e.to_string())?;

  let hydration_script = input.assets.entry.as_ref().map(|entry| {
    adapter.hydration_script(entry, input.container_id, &input.assets.layouts)
  });

  Ok(assemble_document(&Document {
    shell: adapter.document_shell(),
    container_id: input.container_id,
    head_tags: rcx.head(),
    assets: input.assets,
    body_html: &body_html,
    hydration_json: Some(hydration_data(&data, &ctx.params)),
    hydration_script,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pyra_core::module::PathsFn;

  #[test]
  fn variant_params_defaults_to_single_render() {
    let module = ModuleExports::default();
    assert_eq!(variant_params(&module).len(), 1);

    let flagged = ModuleExports { prerender: Some(Prerender::Flag(true)), ..Default::default() };
    assert_eq!(variant_params(&flagged).len(), 1);
  }

  #[test]
  fn variant_params_expands_paths() {
    let paths: PathsFn = Arc::new(|| {
      vec![
        HashMap::from([("version".to_string(), "1.0".to_string())]),
        HashMap::from([("version".to_string(), "1.1".to_string())]),
      ]
    });
    let module = ModuleExports { prerender: Some(Prerender::Paths(paths)), ..Default::default() };
    assert!(is_multi_variant(&module));
    assert_eq!(variant_params(&module).len(), 2);
  }
}
