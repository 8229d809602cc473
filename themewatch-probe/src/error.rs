//! Error types for themewatch-probe.

use std::path::PathBuf;

use thiserror::Error;

/// The OS theme store could not be read or written.
///
/// Always recoverable from the monitor's point of view: the tick is skipped
/// and retried on the next interval.
#[derive(Debug, Error)]
pub enum AccessError {
    /// I/O failure on a file-backed store.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not the expected JSON document.
    #[error("malformed theme state at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A settings tool could not be launched at all.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A settings tool ran but reported failure.
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: &'static str,
        status: String,
        stderr: String,
    },

    /// A settings tool printed something we cannot interpret.
    #[error("unrecognised {what} value: {value:?}")]
    Unparsable { what: &'static str, value: String },

    /// The store is temporarily unavailable.
    #[error("theme store unavailable: {0}")]
    Unavailable(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AccessError {
    AccessError::Io {
        path: path.into(),
        source,
    }
}
