/* src/core/src/manifest.rs */

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::PyraError;
use crate::route::{CacheDirectives, RenderMode, RouteKind};

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

/// The persisted build artifact the production server boots from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  pub version: u32,
  pub adapter: String,
  pub base: String,
  /// Unix milliseconds at emission time.
  pub built_at: u64,
  pub default_render_mode: RenderMode,
  pub routes: BTreeMap<String, RouteEntry>,
  pub assets: BTreeMap<String, AssetMeta>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub spa_fallback: Option<String>,
}

/// Client-side artifacts of a page route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientArtifacts {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_entry: Option<String>,
  #[serde(default)]
  pub client_chunks: Vec<String>,
  #[serde(default)]
  pub css: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRef {
  pub id: String,
  pub server: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryRef {
  pub id: String,
  pub server: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client: Option<String>,
}

/// Server + overlay artifacts shared by the server-rendered page variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifacts {
  pub server_module: String,
  #[serde(flatten)]
  pub client: ClientArtifacts,
  #[serde(default)]
  pub layouts: Vec<LayoutRef>,
  #[serde(default)]
  pub middleware: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_boundary: Option<BoundaryRef>,
}

/// Per-route manifest entry: a sum type keyed by route type and render
/// mode, so each variant carries exactly the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RouteEntry {
  #[serde(rename_all = "camelCase")]
  PageSsr {
    pattern: String,
    #[serde(flatten)]
    page: PageArtifacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache: Option<CacheDirectives>,
  },
  #[serde(rename_all = "camelCase")]
  PageSsgSingle {
    pattern: String,
    #[serde(flatten)]
    page: PageArtifacts,
    /// Prebuilt HTML file, relative to the client output dir.
    html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache: Option<CacheDirectives>,
  },
  #[serde(rename_all = "camelCase")]
  PageSsgMulti {
    pattern: String,
    #[serde(flatten)]
    page: PageArtifacts,
    /// Prerendered variant count; HTML paths derive from the request path.
    variants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache: Option<CacheDirectives>,
  },
  #[serde(rename_all = "camelCase")]
  PageSpa {
    pattern: String,
    #[serde(flatten)]
    client: ClientArtifacts,
    #[serde(default)]
    middleware: Vec<String>,
  },
  #[serde(rename_all = "camelCase")]
  Api {
    pattern: String,
    server_module: String,
    #[serde(default)]
    middleware: Vec<String>,
    methods: Vec<String>,
  },
}

impl RouteEntry {
  pub fn pattern(&self) -> &str {
    match self {
      Self::PageSsr { pattern, .. }
      | Self::PageSsgSingle { pattern, .. }
      | Self::PageSsgMulti { pattern, .. }
      | Self::PageSpa { pattern, .. }
      | Self::Api { pattern, .. } => pattern,
    }
  }

  pub fn route_kind(&self) -> RouteKind {
    match self {
      Self::Api { .. } => RouteKind::Api,
      _ => RouteKind::Page,
    }
  }

  pub fn render_mode(&self) -> RenderMode {
    match self {
      Self::PageSsgSingle { .. } | Self::PageSsgMulti { .. } => RenderMode::Ssg,
      Self::PageSpa { .. } => RenderMode::Spa,
      _ => RenderMode::Ssr,
    }
  }

  pub fn server_module(&self) -> Option<&str> {
    match self {
      Self::PageSsr { page, .. }
      | Self::PageSsgSingle { page, .. }
      | Self::PageSsgMulti { page, .. } => Some(&page.server_module),
      Self::Api { server_module, .. } => Some(server_module),
      Self::PageSpa { .. } => None,
    }
  }

  pub fn middleware(&self) -> &[String] {
    match self {
      Self::PageSsr { page, .. }
      | Self::PageSsgSingle { page, .. }
      | Self::PageSsgMulti { page, .. } => &page.middleware,
      Self::PageSpa { middleware, .. } | Self::Api { middleware, .. } => middleware,
    }
  }

  pub fn page_artifacts(&self) -> Option<&PageArtifacts> {
    match self {
      Self::PageSsr { page, .. }
      | Self::PageSsgSingle { page, .. }
      | Self::PageSsgMulti { page, .. } => Some(page),
      _ => None,
    }
  }

  pub fn client_artifacts(&self) -> Option<&ClientArtifacts> {
    match self {
      Self::PageSsr { page, .. }
      | Self::PageSsgSingle { page, .. }
      | Self::PageSsgMulti { page, .. } => Some(&page.client),
      Self::PageSpa { client, .. } => Some(client),
      Self::Api { .. } => None,
    }
  }

  pub fn cache(&self) -> Option<&CacheDirectives> {
    match self {
      Self::PageSsr { cache, .. }
      | Self::PageSsgSingle { cache, .. }
      | Self::PageSsgMulti { cache, .. } => cache.as_ref(),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMeta {
  pub size: u64,
  pub hash: String,
  pub mime: String,
}

impl Manifest {
  pub fn from_file(path: &Path) -> Result<Self, PyraError> {
    let content = std::fs::read_to_string(path)
      .map_err(|e| PyraError::internal(format!("failed to read {}: {e}", path.display())))?;
    let manifest: Self = serde_json::from_str(&content)
      .map_err(|e| PyraError::internal(format!("failed to parse {}: {e}", path.display())))?;
    if manifest.version != MANIFEST_VERSION {
      return Err(PyraError::internal(format!(
        "unsupported manifest version {} (expected {MANIFEST_VERSION})",
        manifest.version
      )));
    }
    Ok(manifest)
  }

  pub fn write_to(&self, path: &Path) -> Result<(), PyraError> {
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json)
      .map_err(|e| PyraError::internal(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn artifacts(server: &str) -> PageArtifacts {
    PageArtifacts {
      server_module: server.to_string(),
      client: ClientArtifacts {
        client_entry: Some("assets/home-abc123.js".to_string()),
        client_chunks: vec!["assets/shared-def456.js".to_string()],
        css: vec!["assets/home-abc123.css".to_string()],
      },
      layouts: vec![LayoutRef {
        id: "/".to_string(),
        server: "server/layout_root.mjs".to_string(),
        client: Some("assets/layout_root-fff000.js".to_string()),
      }],
      middleware: vec!["server/mw_0.mjs".to_string()],
      error_boundary: None,
    }
  }

  fn sample() -> Manifest {
    let mut routes = BTreeMap::new();
    routes.insert(
      "/".to_string(),
      RouteEntry::PageSsr { pattern: "/".to_string(), page: artifacts("server/index.mjs"), cache: None },
    );
    routes.insert(
      "/releases/[version]".to_string(),
      RouteEntry::PageSsgMulti {
        pattern: "/releases/:version".to_string(),
        page: artifacts("server/releases_version.mjs"),
        variants: 2,
        cache: Some(CacheDirectives { max_age: Some(60), ..Default::default() }),
      },
    );
    routes.insert(
      "/api/users/[id]".to_string(),
      RouteEntry::Api {
        pattern: "/api/users/:id".to_string(),
        server_module: "server/api_users_id.mjs".to_string(),
        middleware: Vec::new(),
        methods: vec!["GET".to_string()],
      },
    );
    let mut assets = BTreeMap::new();
    assets.insert(
      "assets/home-abc123.js".to_string(),
      AssetMeta { size: 2048, hash: "abc123def456".to_string(), mime: "text/javascript".to_string() },
    );
    Manifest {
      version: MANIFEST_VERSION,
      adapter: "test-adapter".to_string(),
      base: "/".to_string(),
      built_at: 1_700_000_000_000,
      default_render_mode: RenderMode::Ssr,
      routes,
      assets,
      spa_fallback: None,
    }
  }

  #[test]
  fn round_trips_through_json() {
    let manifest = sample();
    let json = serde_json::to_string_pretty(&manifest).expect("serialize");
    let restored: Manifest = serde_json::from_str(&json).expect("parse");
    assert_eq!(restored.routes.len(), 3);
    let entry = restored.routes.get("/releases/[version]").expect("entry");
    assert_eq!(entry.render_mode(), RenderMode::Ssg);
    assert_eq!(entry.pattern(), "/releases/:version");
    assert_eq!(entry.cache().and_then(|c| c.max_age), Some(60));
  }

  #[test]
  fn variant_tags_are_kebab_case() {
    let json = serde_json::to_value(sample()).expect("json");
    assert_eq!(json["routes"]["/"]["kind"], "page-ssr");
    assert_eq!(json["routes"]["/releases/[version]"]["kind"], "page-ssg-multi");
    assert_eq!(json["routes"]["/api/users/[id]"]["kind"], "api");
  }

  #[test]
  fn api_entry_carries_only_api_fields() {
    let json = serde_json::to_value(sample()).expect("json");
    let api = &json["routes"]["/api/users/[id]"];
    assert_eq!(api["methods"][0], "GET");
    assert!(api.get("clientEntry").is_none());
    assert!(api.get("layouts").is_none());
  }

  #[test]
  fn field_names_are_camel_case() {
    let json = serde_json::to_value(sample()).expect("json");
    assert!(json.get("builtAt").is_some());
    assert!(json.get("defaultRenderMode").is_some());
    let home = &json["routes"]["/"];
    assert!(home.get("serverModule").is_some());
    assert!(home.get("clientEntry").is_some());
    let cache = &json["routes"]["/releases/[version]"]["cache"];
    assert!(cache.get("maxAge").is_some());
  }

  #[test]
  fn version_mismatch_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("manifest.json");
    let mut manifest = sample();
    manifest.version = 2;
    let json = serde_json::to_string(&manifest).expect("serialize");
    std::fs::write(&path, json).expect("write");
    let err = Manifest::from_file(&path).expect_err("version");
    assert!(err.message().contains("unsupported manifest version"));
  }

  #[test]
  fn file_round_trip() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("manifest.json");
    sample().write_to(&path).expect("write");
    let restored = Manifest::from_file(&path).expect("read");
    assert_eq!(restored.adapter, "test-adapter");
    assert_eq!(restored.assets.len(), 1);
  }
}
