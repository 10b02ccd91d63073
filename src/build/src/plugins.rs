/* src/build/src/plugins.rs */

use anyhow::Result;
use pyra_core::Manifest;

use crate::config::BuildConfig;

/// Context handed to plugin hooks once the build configuration is final.
pub struct BuildContext<'a> {
  pub config: &'a BuildConfig,
  pub adapter_name: &'a str,
}

/// Build-level plugin hooks, fired in order around the orchestrator:
/// `config` before anything runs (and may mutate the configuration),
/// `setup` / `build_start` around the bundle passes, and `build_end` with
/// the final manifest, which it may mutate before emission.
pub trait BuildPlugin: Send + Sync {
  fn name(&self) -> &str;

  fn config(&self, _config: &mut BuildConfig) -> Result<()> {
    Ok(())
  }

  fn setup(&self, _ctx: &BuildContext<'_>) -> Result<()> {
    Ok(())
  }

  fn build_start(&self, _ctx: &BuildContext<'_>) -> Result<()> {
    Ok(())
  }

  fn build_end(&self, _manifest: &mut Manifest) -> Result<()> {
    Ok(())
  }
}
