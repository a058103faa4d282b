//! Logging setup for the ao binary.
//!
//! acme shows a command's stderr in its `+Errors` window, so the default
//! level is `warn`. `AO_DEBUG_LOG=1` turns on debug output, `RUST_LOG` is
//! honoured otherwise, and `AO_LOG_DIR` adds a plain-text log file.
//!
//! Fatal errors are logged under [`FATAL_TARGET`], which stays out of stderr:
//! `main` prints those as one plain line instead.

use std::env;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const FATAL_TARGET: &str = "ao::fatal";

const DEBUG_ENV: &str = "AO_DEBUG_LOG";
const LOG_DIR_ENV: &str = "AO_LOG_DIR";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init() -> Option<WorkerGuard> {
    let filter = if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() != FATAL_TARGET));

    let mut file_error = None;
    let (file_layer, guard) = match log_dir() {
        Some(dir) => match file_appender(&dir) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_writer(writer).with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                file_error = Some((dir, err));
                (None, None)
            }
        },
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some((dir, err)) = file_error {
        tracing::warn!(dir = %dir.display(), error = %err, "Log file disabled");
    }

    guard
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn log_dir() -> Option<PathBuf> {
    env::var_os(LOG_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("ao")
        .filename_suffix("log")
        .build(dir)
}
