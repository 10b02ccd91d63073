/* src/core/src/bundler.rs */

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::PyraError;
use crate::module::{BoxFuture, ModuleExports};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Browser,
  Node,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sourcemaps {
  #[default]
  Off,
  Inline,
  Linked,
}

/// One named entrypoint of a multi-entry bundle pass.
#[derive(Debug, Clone)]
pub struct BundleEntry {
  pub name: String,
  pub source: PathBuf,
}

/// Per-invocation bundle options.
#[derive(Debug, Clone)]
pub struct BundleOptions {
  pub platform: Platform,
  pub minify: bool,
  pub sourcemaps: Sourcemaps,
  pub target: String,
  pub splitting: bool,
  pub externals: Vec<String>,
  pub out_dir: PathBuf,
  /// Adapter-contributed plugin names, forwarded opaquely.
  pub plugins: Vec<String>,
}

impl BundleOptions {
  pub fn browser(out_dir: PathBuf) -> Self {
    Self {
      platform: Platform::Browser,
      minify: true,
      sourcemaps: Sourcemaps::Off,
      target: "es2022".to_string(),
      splitting: true,
      externals: Vec::new(),
      out_dir,
      plugins: Vec::new(),
    }
  }

  pub fn node(out_dir: PathBuf, externals: Vec<String>) -> Self {
    Self {
      platform: Platform::Node,
      minify: false,
      sourcemaps: Sourcemaps::Inline,
      target: "node20".to_string(),
      splitting: false,
      externals,
      out_dir,
      plugins: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
  ImportStatement,
  DynamicImport,
  RequireCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMeta {
  pub path: String,
  pub kind: ImportKind,
  #[serde(default)]
  pub external: bool,
}

/// Metadata for one emitted output file, relative to the pass out dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMeta {
  pub path: String,
  /// Entry name this output was produced from; shared chunks have none.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entry: Option<String>,
  pub bytes: u64,
  #[serde(default)]
  pub css: Vec<String>,
  #[serde(default)]
  pub imports: Vec<ImportMeta>,
  #[serde(default)]
  pub exports: Vec<String>,
}

/// Machine-readable result of a multi-entry bundle pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleMetadata {
  pub outputs: Vec<OutputMeta>,
}

impl BundleMetadata {
  pub fn output_for_entry(&self, entry: &str) -> Option<&OutputMeta> {
    self.outputs.iter().find(|o| o.entry.as_deref() == Some(entry))
  }

  /// Non-external static-import chunk paths of an entry output, excluding
  /// the output itself.
  pub fn chunks_of(&self, output: &OutputMeta) -> Vec<String> {
    output
      .imports
      .iter()
      .filter(|i| i.kind == ImportKind::ImportStatement && !i.external && i.path != output.path)
      .map(|i| i.path.clone())
      .collect()
  }
}

/// A module the bundler compiled and loaded: the executable artifact path,
/// its export names, and the callable table behind them.
#[derive(Debug, Clone)]
pub struct CompiledModule {
  pub path: PathBuf,
  pub exports: Vec<String>,
  pub module: Arc<ModuleExports>,
}

/// The bundling contract the core depends on. Concrete bundlers live
/// outside the core; the pipeline and the build orchestrator only see this.
pub trait BundlerService: Send + Sync {
  /// Dev path: compile one source file into an executable module. Called on
  /// first request and again after invalidation; repeated invalidation of
  /// the same source must be tolerated.
  fn compile(&self, source: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>>;

  /// Build path: bundle a set of entrypoints, producing output files under
  /// `options.out_dir` plus metadata describing every output.
  fn bundle(
    &self,
    entries: Vec<BundleEntry>,
    options: BundleOptions,
  ) -> BoxFuture<Result<BundleMetadata, PyraError>>;

  /// Prod path: load a previously bundled server module by artifact path.
  fn load_module(&self, path: PathBuf) -> BoxFuture<Result<CompiledModule, PyraError>>;
}
