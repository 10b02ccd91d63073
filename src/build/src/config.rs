/* src/build/src/config.rs */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use pyra_core::RenderMode;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "pyra.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct PyraConfig {
  pub project: ProjectSection,
  #[serde(default)]
  pub routes: RoutesSection,
  #[serde(default)]
  pub build: BuildSection,
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub env: EnvSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesSection {
  #[serde(default = "default_routes_dir")]
  pub dir: String,
}

impl Default for RoutesSection {
  fn default() -> Self {
    Self { dir: default_routes_dir() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
  #[serde(default = "default_out_dir")]
  pub out_dir: String,
  #[serde(default = "default_public_dir")]
  pub public_dir: String,
  #[serde(default = "default_base")]
  pub base: String,
  #[serde(default)]
  pub default_render_mode: RenderMode,
  /// Client entry used by the SPA build path when no routes dir exists.
  pub spa_entry: Option<String>,
  #[serde(default)]
  pub minify: Option<bool>,
  pub target: Option<String>,
  #[serde(default)]
  pub externals: Vec<String>,
}

impl Default for BuildSection {
  fn default() -> Self {
    Self {
      out_dir: default_out_dir(),
      public_dir: default_public_dir(),
      base: default_base(),
      default_render_mode: RenderMode::default(),
      spa_entry: None,
      minify: None,
      target: None,
      externals: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServerSection {
  fn default() -> Self {
    Self { host: default_host(), port: default_port() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvSection {
  #[serde(default = "default_env_prefix")]
  pub prefix: String,
}

impl Default for EnvSection {
  fn default() -> Self {
    Self { prefix: default_env_prefix() }
  }
}

fn default_routes_dir() -> String {
  "routes".to_string()
}

fn default_out_dir() -> String {
  ".pyra/output".to_string()
}

fn default_public_dir() -> String {
  "public".to_string()
}

fn default_base() -> String {
  "/".to_string()
}

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  3000
}

fn default_env_prefix() -> String {
  "PYRA_".to_string()
}

impl PyraConfig {
  pub fn validate(&self) -> Result<()> {
    if self.project.name.trim().is_empty() {
      bail!("project.name must not be empty");
    }
    if !self.build.base.starts_with('/') {
      bail!("build.base must start with \"/\" (got \"{}\")", self.build.base);
    }
    if self.env.prefix.is_empty() {
      bail!("env.prefix must not be empty");
    }
    Ok(())
  }
}

/// Walk up from `start` looking for a `pyra.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
  let mut dir = start.to_path_buf();
  loop {
    let candidate = dir.join(CONFIG_FILE);
    if candidate.is_file() {
      return Some(candidate);
    }
    if !dir.pop() {
      return None;
    }
  }
}

pub fn load_config(path: &Path) -> Result<PyraConfig> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  let config: PyraConfig =
    toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
  config.validate()?;
  Ok(config)
}

/// Resolved build inputs: every path made absolute against the project dir.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  pub project_name: String,
  pub routes_dir: PathBuf,
  pub out_dir: PathBuf,
  pub public_dir: Option<PathBuf>,
  pub base: String,
  pub default_render_mode: RenderMode,
  pub spa_entry: Option<PathBuf>,
  pub minify: bool,
  pub target: Option<String>,
  pub externals: Vec<String>,
  pub env_prefix: String,
}

impl BuildConfig {
  pub fn from_config(config: &PyraConfig, base_dir: &Path) -> Self {
    let public = base_dir.join(&config.build.public_dir);
    Self {
      project_name: config.project.name.clone(),
      routes_dir: base_dir.join(&config.routes.dir),
      out_dir: base_dir.join(&config.build.out_dir),
      public_dir: public.is_dir().then_some(public),
      base: config.build.base.clone(),
      default_render_mode: config.build.default_render_mode,
      spa_entry: config.build.spa_entry.as_ref().map(|e| base_dir.join(e)),
      minify: config.build.minify.unwrap_or(true),
      target: config.build.target.clone(),
      externals: config.build.externals.clone(),
      env_prefix: config.env.prefix.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minimal_config_gets_defaults() {
    let config: PyraConfig = toml::from_str(
      r#"
[project]
name = "demo"
"#,
    )
    .expect("parse");
    config.validate().expect("valid");
    assert_eq!(config.routes.dir, "routes");
    assert_eq!(config.build.out_dir, ".pyra/output");
    assert_eq!(config.build.base, "/");
    assert_eq!(config.build.default_render_mode, RenderMode::Ssr);
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.env.prefix, "PYRA_");
  }

  #[test]
  fn full_config_overrides() {
    let config: PyraConfig = toml::from_str(
      r#"
[project]
name = "site"

[routes]
dir = "app/routes"

[build]
out_dir = "dist"
public_dir = "static"
base = "/app"
default_render_mode = "ssg"
minify = false
externals = ["react", "react-dom"]

[server]
host = "0.0.0.0"
port = 8080

[env]
prefix = "SITE_"
"#,
    )
    .expect("parse");
    config.validate().expect("valid");
    assert_eq!(config.build.default_render_mode, RenderMode::Ssg);
    assert_eq!(config.build.externals, ["react", "react-dom"]);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.env.prefix, "SITE_");
  }

  #[test]
  fn invalid_base_rejected() {
    let config: PyraConfig = toml::from_str(
      r#"
[project]
name = "demo"

[build]
base = "app"
"#,
    )
    .expect("parse");
    let err = config.validate().expect_err("invalid base");
    assert!(err.to_string().contains("build.base"));
  }

  #[test]
  fn empty_project_name_rejected() {
    let config: PyraConfig = toml::from_str(
      r#"
[project]
name = "  "
"#,
    )
    .expect("parse");
    assert!(config.validate().is_err());
  }

  #[test]
  fn find_config_walks_up() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let nested = tmp.path().join("a/b/c");
    std::fs::create_dir_all(&nested).expect("mkdir");
    std::fs::write(tmp.path().join(CONFIG_FILE), "[project]\nname = \"x\"\n").expect("write");

    let found = find_config(&nested).expect("found");
    assert_eq!(found, tmp.path().join(CONFIG_FILE));
  }

  #[test]
  fn build_config_resolves_paths() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config: PyraConfig = toml::from_str("[project]\nname = \"x\"\n").expect("parse");
    let build = BuildConfig::from_config(&config, tmp.path());
    assert_eq!(build.routes_dir, tmp.path().join("routes"));
    assert_eq!(build.out_dir, tmp.path().join(".pyra/output"));
    // public dir does not exist, so it is dropped
    assert!(build.public_dir.is_none());
    assert!(build.minify);
  }
}
