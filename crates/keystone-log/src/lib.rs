//! Structured logging for the Keystone multiblock engine.
//!
//! Installs a `tracing` subscriber with console output (uptime timestamps and
//! module paths) and, in debug builds, a JSON file layer for post-mortem
//! analysis of placement and persistence failures. The log level comes from
//! `RUST_LOG` when set, otherwise from the configuration.

use keystone_config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config provide one.
const DEFAULT_FILTER: &str = "info,rusqlite=warn";

/// File name of the JSON log written in debug builds.
const LOG_FILE: &str = "keystone.log";

/// Initialize the tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file (debug builds only)
/// * `debug_build` - Whether this is a debug build (enables file logging)
/// * `config` - Optional configuration providing the log level and file toggle
///
/// ```no_run
/// use keystone_config::Config;
/// use keystone_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_string(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_path) = json_log_path(log_dir, debug_build, config)
        && let Some(log_dir) = log_path.parent()
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(&log_path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Where the JSON log goes, or `None` when file logging is off: release
/// builds, no log directory, or `logging.json_file` disabled.
fn json_log_path(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Option<PathBuf> {
    let json_file = config.is_none_or(|c| c.logging.json_file);
    if !debug_build || !json_file {
        return None;
    }
    log_dir.map(|dir| dir.join(LOG_FILE))
}

/// Resolves the filter directive string from the config, falling back to
/// [`DEFAULT_FILTER`] when the configured level is blank.
fn filter_string(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.logging.log_level.trim().is_empty() => {
            config.logging.log_level.clone()
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}
