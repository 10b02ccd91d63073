/* src/build/src/lib.rs */

pub mod assets_out;
pub mod config;
pub mod entries;
pub mod exports;
pub mod orchestrator;
pub mod plugins;
pub mod prerender;
pub mod ui;


pub use config::{BuildConfig, CONFIG_FILE, PyraConfig, find_config, load_config};
pub use exports::detect_exports;
pub use orchestrator::{BuildOutcome, SPA_FALLBACK_FILE, run_build};
pub use plugins::{BuildContext, BuildPlugin};

/// Re-export the core for consumers that only depend on the build crate.
pub use pyra_core;
