use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the monitor lifecycle, control surface, and daemon.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("theme store error: {0}")]
    Access(#[from] themewatch_probe::AccessError),

    #[error("event log error: {0}")]
    Storage(#[from] themewatch_store::StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] themewatch_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("monitor is already running")]
    AlreadyRunning,

    #[error("monitor must be started from within a tokio runtime")]
    NoRuntime,

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MonitorError {
    MonitorError::Io {
        path: path.into(),
        source,
    }
}
