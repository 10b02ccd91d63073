/* src/server/src/lib.rs */

mod assets;
mod dev;
mod error;
mod prod;
mod service;


pub use assets::{IMMUTABLE_CACHE, NO_CACHE};
pub use dev::{DevOptions, DevServer};
pub use prod::{ProdOptions, ProdServer};
pub use service::{SiteSource, serve};

/// Re-export the core for consumers that only depend on the server crate.
pub use pyra_core;
