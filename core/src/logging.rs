//! Tracing setup: stderr plus a size-rotated log file.

use std::fs;
use std::path::Path;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

pub const LOG_FILE_NAME: &str = "heartbeat.log";
const MAX_LOG_BYTES: u64 = 1_000_000;
const MAX_LOG_BACKUPS: usize = 3;

/// Install the global subscriber.
///
/// The level defaults to `info` and can be overridden with `RUST_LOG`. The
/// returned guard flushes the file writer on drop and must be held for the
/// life of the process. When the log directory cannot be used, only stderr is
/// logged to and `None` is returned.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env_lossy()
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let appender = fs::create_dir_all(log_dir).and_then(|_| {
        BasicRollingFileAppender::new(
            log_dir.join(LOG_FILE_NAME),
            RollingConditionBasic::new().max_size(MAX_LOG_BYTES),
            MAX_LOG_BACKUPS,
        )
    });

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());

            let _ = tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        Err(e) => {
            let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
            tracing::warn!(error = %e, dir = ?log_dir, "file logging unavailable");
            None
        }
    }
}
