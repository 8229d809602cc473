//! The state-reader capability and backend selection.

use std::path::Path;

use themewatch_core::{BackendKind, MonitorConfig, ThemeMode, ThemeState};

use crate::error::AccessError;
use crate::file::FileStateReader;
use crate::gnome::GnomeReader;
use crate::windows::WindowsRegistryReader;

/// Reads and writes the two monitored settings (app-level, system-level).
///
/// Implementations must treat a missing key as [`ThemeMode::Light`] rather
/// than failing, and `write` must be idempotent: writing the mode the store
/// already holds leaves the store untouched.
pub trait StateReader: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    fn sample(&self) -> Result<ThemeState, AccessError>;

    /// Set both settings to `mode`.
    fn write(&self, mode: ThemeMode) -> Result<(), AccessError>;
}

/// Build the reader selected by `config`, resolving default paths under `home`.
pub fn reader_for(config: &MonitorConfig, home: &Path) -> Box<dyn StateReader> {
    match config.backend {
        BackendKind::File => Box::new(FileStateReader::new(config.state_file_at(home))),
        BackendKind::Gnome => Box::new(GnomeReader::new()),
        BackendKind::Windows => Box::new(WindowsRegistryReader::new()),
        BackendKind::Auto if cfg!(windows) => Box::new(WindowsRegistryReader::new()),
        BackendKind::Auto => Box::new(GnomeReader::new()),
    }
}
