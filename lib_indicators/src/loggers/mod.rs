//! # Logging Setup
//!
//! Installs the process-wide `tracing` subscriber:
//!
//! - an `EnvFilter`, taken from `RUST_LOG` when set, otherwise from the
//!   configured level;
//! - an ANSI console layer;
//! - an optional JSON layer writing to a daily rolling file through a
//!   non-blocking writer.
//!
//! The returned `WorkerGuard` flushes the file writer when dropped, so keep it
//! alive for as long as the process logs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Settings for [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info`.
    pub level: String,
    /// Directory of the JSON log files. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// File name prefix; the date is appended by the rolling appender.
    pub file_prefix: String,
    /// Whether to log to the console.
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: Some(PathBuf::from("logs")),
            file_prefix: "indicators".to_string(),
            console: true,
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The log directory could not be created.
    #[error("cannot create log directory: {0}")]
    Io(#[from] io::Error),
    /// Neither `RUST_LOG` nor the configured level is a valid filter.
    #[error("invalid log filter '{0}'")]
    Filter(String),
    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    Init(String),
}

/// Builds the filter: `RUST_LOG` first, then `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LoggerError::Filter(level.to_string()))
}

/// # Setup Logging
///
/// Installs the global subscriber described by `settings`. Returns the file
/// writer's guard, or `None` when file logging is disabled.
pub fn setup_logging(settings: &LogSettings) -> Result<Option<WorkerGuard>, LoggerError> {
    let env_filter = build_filter(&settings.level)?;

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = rolling::daily(dir, &settings.file_prefix);
            let (writer, guard) = non_blocking(file_appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = settings.console.then(|| fmt::layer().with_target(true).with_ansi(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    Ok(guard)
}
