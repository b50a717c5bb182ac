//! Configuration system for the ParkSphere engine.
//!
//! Runtime settings persist to disk as RON files. CLI overrides come from clap,
//! and every section tolerates missing or unknown fields so old config files
//! keep loading after upgrades.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AssetConfig, CameraConfig, Config, DebugConfig, FreeFlyConfig, OrbitConfig, QualityConfig,
    RenderConfig, SurfaceConfig,
};
pub use error::ConfigError;
