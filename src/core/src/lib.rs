/* src/core/src/lib.rs */

pub mod adapter;
pub mod bundler;
pub mod context;
pub mod cookies;
pub mod errors;
pub mod escape;
pub mod manifest;
pub mod matcher;
pub mod middleware;
pub mod mime;
pub mod module;
pub mod pipeline;
pub mod provider;
pub mod response;
pub mod route;
pub mod scanner;

// Re-exports for ergonomic use
pub use adapter::{
  Component, CONTAINER_TOKEN, DATA_SCRIPT_ID, DEFAULT_CONTAINER_ID, HEAD_MARKER, OUTLET_MARKER,
  RenderContext, UiAdapter,
};
pub use bundler::{
  BundleEntry, BundleMetadata, BundleOptions, BundlerService, CompiledModule, ImportKind,
  ImportMeta, OutputMeta, Platform, Sourcemaps,
};
pub use context::{Ctx, Mode, Request, RequestContext, RequestUrl, env_slice};
pub use cookies::{CookieJar, CookieOptions, SameSite};
pub use errors::PyraError;
pub use escape::escape_inline_json;
pub use manifest::{AssetMeta, Manifest, MANIFEST_FILE, MANIFEST_VERSION, RouteEntry};
pub use matcher::{RouteGraph, RouteMatch};
pub use module::{
  ApiHandlerFn, BoxFuture, HTTP_METHODS, LoadFn, LoadOutcome, MiddlewareFn, ModuleExports, NextFn,
  Prerender, resolve_render_mode,
};
pub use pipeline::{Pipeline, PipelineOptions};
pub use provider::{ClientAssets, ModuleProvider};
pub use response::Response;
pub use route::{CacheDirectives, RenderMode, Route, RouteKind, sanitize_id};
pub use scanner::{ScanOutcome, scan};
