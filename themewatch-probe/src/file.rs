//! JSON-file theme store.
//!
//! Mirrors the registry layout as a small document:
//!
//! ```json
//! { "apps_use_light_theme": 1, "system_uses_light_theme": 0 }
//! ```
//!
//! A missing file or field reads as light. Writes use the `.tmp` + rename
//! pattern so a concurrent reader never observes a half-written document.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use themewatch_core::{ThemeMode, ThemeState};

use crate::error::{io_err, AccessError};
use crate::reader::StateReader;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    apps_use_light_theme: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_uses_light_theme: Option<u32>,
}

impl StateDocument {
    fn modes(&self) -> (ThemeMode, ThemeMode) {
        (
            self.apps_use_light_theme
                .map(ThemeMode::from_light_flag)
                .unwrap_or(ThemeMode::Light),
            self.system_uses_light_theme
                .map(ThemeMode::from_light_flag)
                .unwrap_or(ThemeMode::Light),
        )
    }
}

#[derive(Debug)]
pub struct FileStateReader {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StateDocument, AccessError> {
        if !self.path.exists() {
            return Ok(StateDocument::default());
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(StateDocument::default());
        }
        serde_json::from_str(&contents).map_err(|source| AccessError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, doc: &StateDocument) -> Result<(), AccessError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(doc).map_err(|source| AccessError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl StateReader for FileStateReader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn sample(&self) -> Result<ThemeState, AccessError> {
        let (app, system) = self.load()?.modes();
        Ok(ThemeState::new(app, system))
    }

    fn write(&self, mode: ThemeMode) -> Result<(), AccessError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.load()?;
        let target = StateDocument {
            apps_use_light_theme: Some(mode.light_flag()),
            system_uses_light_theme: Some(mode.light_flag()),
        };
        if current == target {
            return Ok(());
        }
        self.store(&target)?;
        tracing::debug!(path = %self.path.display(), mode = %mode, "theme state file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_light() {
        let tmp = TempDir::new().unwrap();
        let reader = FileStateReader::new(tmp.path().join("state.json"));
        let state = reader.sample().unwrap();
        assert_eq!(state.app_mode, ThemeMode::Light);
        assert_eq!(state.system_mode, ThemeMode::Light);
    }

    #[test]
    fn missing_field_reads_as_light() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, r#"{"apps_use_light_theme":0}"#).unwrap();
        let state = FileStateReader::new(&path).sample().unwrap();
        assert_eq!(state.app_mode, ThemeMode::Dark);
        assert_eq!(state.system_mode, ThemeMode::Light);
    }

    #[test]
    fn write_sets_both_settings() {
        let tmp = TempDir::new().unwrap();
        let reader = FileStateReader::new(tmp.path().join("nested").join("state.json"));
        reader.write(ThemeMode::Dark).unwrap();
        let state = reader.sample().unwrap();
        assert!(!state.deviates_from(ThemeMode::Dark));
        assert!(!reader.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn repeated_write_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let reader = FileStateReader::new(tmp.path().join("state.json"));
        reader.write(ThemeMode::Dark).unwrap();
        let before = std::fs::metadata(reader.path()).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        reader.write(ThemeMode::Dark).unwrap();
        let after = std::fs::metadata(reader.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn malformed_file_is_an_access_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "[not, an, object").unwrap();
        let err = FileStateReader::new(&path).sample().unwrap_err();
        assert!(matches!(err, AccessError::Json { .. }), "got: {err}");
    }
}
