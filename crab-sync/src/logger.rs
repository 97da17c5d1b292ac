//! Logging Infrastructure
//!
//! Console output plus optional daily rotating files.

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, prelude::*};

use crate::error::{SyncError, SyncResult};

/// Default filter when neither `RUST_LOG` nor a level is given
pub const DEFAULT_FILTER: &str = "crab_sync=info,shared=info";

fn filter_for(level: &str) -> EnvFilter {
    if level.is_empty() {
        EnvFilter::new(DEFAULT_FILTER)
    } else {
        EnvFilter::new(level)
    }
}

/// Initialize the logging system with optional daily rotating logs
///
/// # Arguments
/// * `level` - Log level or filter directive (e.g., "info", "crab_sync=debug")
/// * `log_dir` - Optional directory for file logging
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Examples
/// ```no_run
/// crab_sync::logger::init_logger("debug", None)?;
/// crab_sync::logger::init_logger("info", Some("./logs"))?;
/// # Ok::<(), crab_sync::SyncError>(())
/// ```
pub fn init_logger(level: &str, log_dir: Option<&str>) -> SyncResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    let result = if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        fs::create_dir_all(log_dir)
            .map_err(|e| SyncError::Internal(format!("Failed to create log dir: {e}")))?;

        let sync_log = RollingFileAppender::new(Rotation::DAILY, log_dir, "sync");
        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(sync_log))
            .with_filter(filter_for(level));

        subscriber.with(console_layer).with(file_layer).try_init()
    } else {
        subscriber.with(console_layer).try_init()
    };

    result.map_err(|e| SyncError::Internal(format!("Failed to install logger: {e}")))
}
