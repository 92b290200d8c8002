//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a file written
//! by a background thread. The filter comes from `RUST_LOG` when set,
//! otherwise from [`LoggingOptions::filter`].

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vzlite_shared::{VzError, VzResult};

/// Name of the log file inside [`LoggingOptions::log_dir`].
pub const LOG_FILE_NAME: &str = "vzlite.log";

/// Keeps the file writer alive for the life of the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingOptions {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Also write logs to `<log_dir>/vzlite.log`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            log_dir: None,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// If the host already installed a subscriber of its own, that one is kept.
pub fn init_logging(options: &LoggingOptions) -> VzResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.filter).map_err(|e| {
            VzError::Validation(format!("invalid log filter '{}': {}", options.filter, e))
        })?,
    };

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .is_ok();

    let _ = LOG_GUARD.set(guard);
    if !installed {
        tracing::debug!("A global subscriber was already installed; keeping it");
    }
    Ok(())
}
