//! Structured logging for the ParkSphere engine.
//!
//! Installs a `tracing` subscriber with an env-driven filter and a console
//! layer. Debug builds can additionally write JSON lines to a log file for
//! post-mortem analysis of frame-time and asset-fallback events.

use parksphere_config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither RUST_LOG nor the config provides one.
pub const DEFAULT_FILTER: &str = "info,ureq=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "parksphere.log";

/// Initialize the global tracing subscriber.
///
/// - RUST_LOG takes precedence over `config.debug.log_level`.
/// - Console output carries uptime timestamps and module targets.
/// - When `debug_build` is set and `log_dir` is writable, a JSON file layer
///   is added as well.
///
/// Calling this twice is harmless; the second installation is ignored.
///
/// ```no_run
/// use parksphere_config::Config;
/// use parksphere_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = resolve_filter(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // asset workers are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(path) = log_dir.and_then(prepare_log_file)
        && let Ok(log_file) = std::fs::File::create(&path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

/// The filter string that `init_logging` falls back to when RUST_LOG is unset.
pub fn resolve_filter(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create `log_dir` if needed and return the log file path inside it.
fn prepare_log_file(log_dir: &Path) -> Option<PathBuf> {
    std::fs::create_dir_all(log_dir).ok()?;
    Some(log_dir.join(LOG_FILE_NAME))
}

/// An `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
