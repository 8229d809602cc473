//! Error types for themewatch-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from event-log operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An error from SQLite.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an export stream failed.
    #[error("export write failed: {0}")]
    Export(#[source] std::io::Error),

    /// A stored row holds a value the domain types cannot represent.
    #[error("corrupt event row {id}: bad {column} value {value:?}")]
    CorruptRow {
        id: i64,
        column: &'static str,
        value: String,
    },

    /// A CSV document that does not match the export layout.
    #[error("malformed CSV at line {line}: {reason}")]
    Csv { line: usize, reason: String },
}

/// Convenience constructor for [`StorageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.into(),
        source,
    }
}
