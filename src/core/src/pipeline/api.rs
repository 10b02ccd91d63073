/* src/core/src/pipeline/api.rs */

use std::sync::Arc;

use crate::context::{Ctx, Mode};
use crate::errors::PyraError;
use crate::module::ModuleExports;
use crate::response::Response;

use super::Pipeline;

/// API terminal: look up the handler exported under the request method and
/// invoke it. Absent handler -> 405 with an `Allow` header listing what the
/// module does export. Handler failures are converted to JSON here, never
/// to an HTML error page.
pub(super) async fn dispatch(pipeline: &Pipeline, ctx: &Ctx, module: &Arc<ModuleExports>) -> Response {
  let Some(handler) = module.handlers.get(&ctx.method) else {
    let allowed = module.allowed_methods();
    let mut response = Response::json(&serde_json::json!({
      "error": format!("Method {} not allowed", ctx.method),
    }))
    .with_status(405);
    if !allowed.is_empty() {
      response.set_header("Allow", &allowed.join(", "));
    }
    return response;
  };

  match handler(ctx.clone()).await {
    Ok(response) => response,
    Err(err) => error_response(pipeline.options().mode, &err),
  }
}

/// JSON error body for API routes: development exposes the message and a
/// stack descriptor, production only the generic text (unless the error is
/// marked user-facing).
pub(super) fn error_response(mode: Mode, err: &PyraError) -> Response {
  let body = if mode.is_dev() {
    serde_json::json!({
      "error": err.message(),
      "stack": format!("{err}"),
    })
  } else if err.is_exposed() {
    serde_json::json!({ "error": err.message() })
  } else {
    serde_json::json!({ "error": "Internal Server Error" })
  };
  Response::json(&body).with_status(err.status())
}
