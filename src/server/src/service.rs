/* src/server/src/service.rs */

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use pyra_core::{Pipeline, PyraError, Request, RequestUrl, RouteGraph};

use crate::error::AxumError;

/// Request bodies larger than this are rejected before the pipeline runs.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Where the request pipeline gets the current route graph. The production
/// server hands out one fixed graph; the development server swaps graphs
/// atomically on rescan.
pub trait SiteSource: Send + Sync {
  fn graph(&self) -> Arc<RouteGraph>;
}

pub(crate) struct ServerState {
  pub pipeline: Pipeline,
  pub site: Arc<dyn SiteSource>,
  /// Static roots tried, in order, before the pipeline sees the request.
  pub static_roots: Vec<PathBuf>,
}

/// Convert an incoming axum request into the core request type. The body
/// is read up front; loaders and handlers see plain bytes.
pub(crate) async fn to_core_request(request: axum::extract::Request) -> Result<Request, PyraError> {
  let (parts, body) = request.into_parts();
  let bytes = axum::body::to_bytes(body, BODY_LIMIT)
    .await
    .map_err(|e| PyraError::bad_request(format!("failed to read request body: {e}")))?;
  let headers = parts
    .headers
    .iter()
    .map(|(name, value)| {
      (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
    })
    .collect();
  Ok(Request {
    method: parts.method.as_str().to_string(),
    url: RequestUrl::new(parts.uri.path(), parts.uri.query().map(str::to_string)),
    headers,
    body: bytes,
  })
}

pub(crate) fn from_core_response(response: pyra_core::Response) -> axum::response::Response {
  let mut builder = axum::http::Response::builder().status(response.status);
  for (name, value) in &response.headers {
    builder = builder.header(name, value);
  }
  builder
    .body(axum::body::Body::from(response.body))
    .unwrap_or_else(|e| AxumError(PyraError::internal(e.to_string())).into_response())
}

async fn handle_any(
  State(state): State<Arc<ServerState>>,
  request: axum::extract::Request,
) -> axum::response::Response {
  let method = request.method();
  if (method == axum::http::Method::GET || method == axum::http::Method::HEAD)
    && let Some(response) = crate::assets::serve_static(&state.static_roots, request.uri().path())
  {
    return from_core_response(response);
  }

  let core_request = match to_core_request(request).await {
    Ok(req) => req,
    Err(err) => return AxumError(err).into_response(),
  };
  let graph = state.site.graph();
  from_core_response(state.pipeline.handle(&graph, core_request).await)
}

/// Every request funnels through one fallback handler: static roots first,
/// then the shared pipeline. The trie, not the framework router, decides
/// route priority.
pub(crate) fn build_router(
  pipeline: Pipeline,
  site: Arc<dyn SiteSource>,
  static_roots: Vec<PathBuf>,
) -> Router {
  let state = Arc::new(ServerState { pipeline, site, static_roots });
  Router::new().fallback(handle_any).with_state(state)
}

/// Serve a router until SIGINT/SIGTERM, then stop accepting connections
/// and drain in-flight requests before returning.
pub async fn serve(router: Router, addr: &str) -> Result<(), PyraError> {
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .map_err(|e| PyraError::internal(format!("failed to bind {addr}: {e}")))?;
  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| PyraError::internal(e.to_string()))
}

async fn shutdown_signal() {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c().await;
  };
  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {}
    () = terminate => {}
  }
}
