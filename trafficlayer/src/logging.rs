//! Tracing output setup for embedding clients.
//!
//! The engine emits structured `tracing` events throughout (aircraft
//! added/removed, rejected events, sweep results) but installs no global
//! subscriber on its own: the embedding client decides where that output
//! goes. [`init_logging`] is the batteries-included setup — compact
//! stderr output plus an optional daily-rotated file log — and
//! [`init_for_tests`] routes events into the test harness capture.
//!
//! Filtering follows `RUST_LOG`; without it, `trafficlayer=info`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes and closes the log file; hold it for the
/// lifetime of the engine.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber for an embedding client.
///
/// Always writes compact single-line events to stderr. With a `log_dir`,
/// additionally appends to a daily-rotated `trafficlayer.log` in that
/// directory through a non-blocking writer, so a long-running session
/// never loses earlier log history.
///
/// Call once per process, before starting the runtime.
///
/// # Errors
///
/// Returns an error when the log directory cannot be created. Nothing is
/// installed in that case; the caller may retry with another directory.
pub fn init_logging(log_dir: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "trafficlayer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter())
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Route engine events into the test harness output capture.
///
/// Safe to call from every test; only the first call in the process
/// installs the subscriber.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_test_writer()
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trafficlayer=info"))
}
