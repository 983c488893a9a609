use std::fs::{File, OpenOptions};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Path of an optional debug log file
pub const LOG_FILE_ENV: &str = "TICKETFEED_LOG_FILE";

/// Install the global subscriber: stderr filtered by `RUST_LOG` (default
/// `info`), plus a debug-level file layer when `TICKETFEED_LOG_FILE` is set.
///
/// If the log file cannot be opened, stderr logging is still installed and
/// the open error is returned.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let Ok(log_path) = std::env::var(LOG_FILE_ENV) else {
        registry.init();
        return Ok(());
    };

    match open_log_file(&log_path) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

            registry.with(file_layer).init();
            eprintln!("File logging enabled: {log_path}");
            Ok(())
        }
        Err(e) => {
            registry.init();
            Err(e)
        }
    }
}

fn open_log_file(path: &str) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {path}"))
}
