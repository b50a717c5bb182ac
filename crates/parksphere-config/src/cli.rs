//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// ParkSphere command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "parksphere", about = "ParkSphere globe and terrain engine")]
pub struct CliArgs {
    /// Surface width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Surface height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Start on a named quality preset (mobile, low, medium, high, ultra).
    #[arg(long)]
    pub quality: Option<String>,

    /// Asset root: a directory or an http(s) URL.
    #[arg(long)]
    pub assets: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of frames to run per view in the scripted session.
    #[arg(long, default_value_t = 240)]
    pub frames: u32,

    /// Site id to visit; defaults to the first catalog entry.
    #[arg(long)]
    pub site: Option<String>,

    /// Pace frames by the wall clock instead of a fixed step.
    #[arg(long)]
    pub realtime: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.surface.width = w;
        }
        if let Some(h) = args.height {
            self.surface.height = h;
        }
        if let Some(ref preset) = args.quality {
            self.quality.preset = Some(preset.clone());
        }
        if let Some(ref assets) = args.assets {
            self.assets.base_url = assets.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
