//! Tracing subscriber setup for the binary

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info,tradegym=debug";
const LOG_FILE_NAME: &str = "tradegym.log";

/// Console logging plus an optional daily rolling file.
///
/// The file directory comes from `TRADEGYM_LOG_DIR`, falling back to
/// `logging.log_dir`. `RUST_LOG` overrides the filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level == "info" {
            EnvFilter::new(DEFAULT_FILTER)
        } else {
            EnvFilter::new(&config.level)
        }
    });

    let log_dir = std::env::var("TRADEGYM_LOG_DIR")
        .ok()
        .or_else(|| config.log_dir.clone());

    // `rolling::daily` panics if it can't create the initial file, so check writability first.
    let file_layer = log_dir
        .as_deref()
        .filter(|dir| log_dir_writable(dir))
        .map(|dir| {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the guard alive for the life of the process
            Box::leak(Box::new(guard));

            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
        });

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/{}", dir, LOG_FILE_NAME);
    }
}

/// Minimal logging for short CLI commands
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

fn log_dir_writable(dir: &str) -> bool {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "Warning: Could not create log directory {} ({}), file logging disabled",
            dir, e
        );
        return false;
    }

    let test_path = Path::new(dir).join(".tradegym_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_path);
            true
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir, e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_writable() {
        let dir = std::env::temp_dir().join(format!("tradegym_logs_{}", std::process::id()));
        assert!(log_dir_writable(dir.to_str().unwrap()));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
