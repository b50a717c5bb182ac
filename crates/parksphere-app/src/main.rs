//! ParkSphere binary: runs a headless viewing session and prints the final
//! metrics snapshot as JSON.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p parksphere-app -- --site yose --frames 120`.

use std::process::ExitCode;

use clap::Parser;
use parksphere_app::{FrameClock, PlatformDirs, SessionPlan, run_session};
use parksphere_config::{CliArgs, Config};
use parksphere_engine::{Engine, EngineOptions, asset_cache_from_config};
use parksphere_render::{HeadlessBackend, SurfaceDescriptor};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match PlatformDirs::for_override(args.config.as_deref()) {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("Failed to resolve config directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&dirs.config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    parksphere_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    let cache = asset_cache_from_config(&config.assets);
    let options = EngineOptions::from_config(&config);
    let mut engine = Engine::new(HeadlessBackend::new(), cache, options);

    let surface = SurfaceDescriptor {
        pixel_ratio: config.surface.pixel_ratio,
        ..SurfaceDescriptor::new(config.surface.width, config.surface.height)
    };
    if let Err(e) = engine.initialize(surface, None) {
        error!("Cannot start: {e}");
        return ExitCode::FAILURE;
    }
    let sites = engine.load_static_data();
    info!(sites = sites.len(), "Static data loaded");

    let mut clock = if args.realtime {
        FrameClock::realtime()
    } else {
        FrameClock::fixed_rate(config.render.target_fps)
    };
    let plan = SessionPlan {
        frames_per_view: args.frames,
        site: args.site.clone(),
        stats_interval: config.debug.stats_interval_frames,
    };
    let report = run_session(&mut engine, &mut clock, &plan);
    engine.dispose();

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize session report: {e}");
            ExitCode::FAILURE
        }
    }
}
