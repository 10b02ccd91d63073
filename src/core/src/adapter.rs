/* src/core/src/adapter.rs */

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::PyraError;

/// Opaque page/layout component value. Only the UI adapter knows what is
/// inside; the core moves it around and hands it back for rendering.
pub type Component = Arc<dyn Any + Send + Sync>;

/// Marker in the document shell where collected head tags are injected.
pub const HEAD_MARKER: &str = "<!--pyra-head-->";
/// Marker in the document shell where the rendered body HTML is injected.
pub const OUTLET_MARKER: &str = "<!--pyra-outlet-->";
/// Literal token in the document shell replaced by the container element id.
pub const CONTAINER_TOKEN: &str = "%PYRA_ROOT%";
/// Default container element id.
pub const DEFAULT_CONTAINER_ID: &str = "__pyra";
/// Element id of the inline JSON script carrying hydration data.
pub const DATA_SCRIPT_ID: &str = "__pyra_data";

/// Per-render context handed to the adapter: the request URL and params,
/// the layout components wrapping the page (outermost first), and a head
/// sink. Pushed head tags retain push order.
pub struct RenderContext {
  pub url: String,
  pub params: HashMap<String, String>,
  pub layouts: Vec<Component>,
  head: Vec<String>,
}

impl RenderContext {
  pub fn new(url: impl Into<String>, params: HashMap<String, String>, layouts: Vec<Component>) -> Self {
    Self { url: url.into(), params, layouts, head: Vec::new() }
  }

  pub fn push_head(&mut self, tag: impl Into<String>) {
    self.head.push(tag.into());
  }

  pub fn head(&self) -> &[String] {
    &self.head
  }

  pub fn into_head(self) -> Vec<String> {
    self.head
  }
}

/// The only seam between the core and a UI framework. Implementations live
/// outside the core; no core file names or imports a framework.
pub trait UiAdapter: Send + Sync {
  fn name(&self) -> &str;

  /// Extensions (without dot) the adapter claims for page, layout, error,
  /// and 404 files.
  fn file_extensions(&self) -> Vec<String>;

  /// Render the page body. When `rcx.layouts` is non-empty the adapter
  /// wraps the page outermost-first. May push tags to the head sink.
  fn render_to_html(
    &self,
    component: &Component,
    data: &serde_json::Value,
    rcx: &mut RenderContext,
  ) -> Result<String, PyraError>;

  /// HTML skeleton containing `HEAD_MARKER`, `OUTLET_MARKER`, and
  /// `CONTAINER_TOKEN`.
  fn document_shell(&self) -> String;

  /// ECMAScript module source that reads the serialized hydration data and
  /// mounts the page (wrapped by the given layout modules) into the
  /// container element.
  fn hydration_script(
    &self,
    client_entry_url: &str,
    container_id: &str,
    layout_client_urls: &[String],
  ) -> String;

  /// Bundler plugin names contributed by the adapter.
  fn bundler_plugins(&self) -> Vec<String> {
    Vec::new()
  }
}
