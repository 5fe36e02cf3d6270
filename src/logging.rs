//! Tracing setup for a process whose terminal is in raw mode.
//!
//! Formatted records never touch stdout. They go through
//! [`tracing_appender::non_blocking`], whose worker thread appends them to the
//! log file so actor workers never block on disk I/O.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Open `path` for appending behind a non-blocking writer.
///
/// Dropping the returned guard flushes pending records.
///
/// # Errors
///
/// I/O errors creating the directory or opening the file.
pub fn file_writer(path: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("not a file: {}", path.display()))
    })?;
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `default_filter`. Without a `log_file` nothing is
/// installed and `None` is returned, since the terminal belongs to the editor.
///
/// # Errors
///
/// I/O errors opening the log file, or a subscriber already installed.
pub fn init(default_filter: &str, log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        return Ok(None);
    };
    let (writer, guard) = file_writer(path)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(writer),
        )
        .with(filter)
        .try_init()
        .map_err(io::Error::other)?;
    Ok(Some(guard))
}
