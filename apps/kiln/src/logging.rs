//! Tracing setup and event forwarding

use kiln_events::AppEvent;
use std::path::Path;
use tracing::{debug, error, info, trace, warn};

const DEBUG_FILTER: &str = "info,kiln=debug,kiln_builder=debug";

/// Initialize tracing/logging
///
/// `--debug` or `RUST_LOG` writes JSON logs to a timestamped file under
/// `logs_dir`. JSON output mode keeps the console clean; otherwise a
/// compact stderr subscriber logs warnings.
pub fn init_tracing(json_mode: bool, debug_flag: bool, logs_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;

    if debug_enabled {
        if let Some(file) = open_log_file(logs_dir, !json_mode) {
            tracing_subscriber::fmt()
                .json()
                .with_writer(file)
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEBUG_FILTER)),
                )
                .init();
            return;
        }
    }

    if json_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("warn,kiln=warn,kiln_builder=warn")
                }),
            )
            .init();
    }
}

fn open_log_file(logs_dir: &Path, announce: bool) -> Option<std::fs::File> {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        if announce {
            eprintln!("Warning: Failed to create log directory: {e}");
        }
        return None;
    }
    let log_file = logs_dir.join(format!(
        "kiln-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    match std::fs::File::create(&log_file) {
        Ok(file) => {
            if announce {
                eprintln!("Debug logging enabled: {}", log_file.display());
            }
            Some(file)
        }
        Err(e) => {
            if announce {
                eprintln!("Warning: Failed to create log file: {e}");
            }
            None
        }
    }
}

/// Forward an event to tracing at its own level
pub fn log_event(event: &AppEvent) {
    let source = event.event_source();
    let fields = event.log_fields();
    match event.log_level() {
        tracing::Level::ERROR => {
            error!(source = source.as_str(), event = %fields, "application event");
        }
        tracing::Level::WARN => {
            warn!(source = source.as_str(), event = %fields, "application event");
        }
        tracing::Level::INFO => {
            info!(source = source.as_str(), event = %fields, "application event");
        }
        tracing::Level::DEBUG => {
            debug!(source = source.as_str(), event = %fields, "application event");
        }
        tracing::Level::TRACE => {
            trace!(source = source.as_str(), event = %fields, "application event");
        }
    }
}
