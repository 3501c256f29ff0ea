//! Diagnostic logging for the client.
//!
//! The panel owns stdout, so diagnostics go to stderr or to a JSONL file.
//! Raw chunks log at `trace`, typing tasks at `debug` and submissions at
//! `info`. The default filter only lets warnings through.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::env_var;
use crate::errors::ClientError;

/// Filter used when neither the config nor `RUST_LOG` names one.
pub const DEFAULT_FILTER: &str = "warn";

const DEFAULT_LOG_FILE: &str = "agent-stream.jsonl";

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Where log records are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr.
    Stderr,
    /// One JSON object per line appended to the file.
    JsonFile(PathBuf),
}

/// Logging settings, resolved alongside [`crate::ClientConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// `tracing` filter directive; `off` silences everything.
    pub filter: Option<String>,
    pub sink: LogSink,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: None,
            sink: LogSink::Stderr,
        }
    }
}

impl LogConfig {
    /// Reads `AGENT_STREAM_LOG` (filter) and `AGENT_STREAM_LOG_FILE` (JSONL path).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(filter) = env_var("AGENT_STREAM_LOG") {
            config.filter = Some(filter);
        }
        if let Some(path) = env_var("AGENT_STREAM_LOG_FILE") {
            config.sink = LogSink::JsonFile(PathBuf::from(path));
        }
        config
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sink = LogSink::JsonFile(path.into());
        self
    }

    /// Explicit filter first, then `RUST_LOG`, then [`DEFAULT_FILTER`].
    fn env_filter(&self) -> Result<EnvFilter, ClientError> {
        match &self.filter {
            Some(directive) => EnvFilter::try_new(directive).map_err(|err| {
                ClientError::Config(format!("invalid log filter {directive:?}: {err}"))
            }),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }
}

/// Splits a log path into the directory to create and the file name.
fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file_name)
}

/// Installs the global subscriber described by `config`.
///
/// Returns `Ok(false)` when logging was already installed by an earlier
/// call; the first configuration wins.
pub fn init_logging(config: &LogConfig) -> Result<bool, ClientError> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }
    let filter = config.env_filter()?;
    let mut installed = false;
    INSTALLED.get_or_try_init(|| {
        match &config.sink {
            LogSink::Stderr => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
            LogSink::JsonFile(path) => {
                let (dir, file_name) = split_log_path(path);
                std::fs::create_dir_all(dir).map_err(|err| {
                    ClientError::Config(format!(
                        "cannot create log directory {}: {err}",
                        dir.display()
                    ))
                })?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
        }
        installed = true;
        Ok::<(), ClientError>(())
    })?;
    Ok(installed)
}
