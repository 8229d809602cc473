//! Monitor configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.themewatch/
//!   config.yaml        (optional: every field has a default; mode 0600)
//!   theme-state.json   (default state file for the `file` backend)
//!   events.db          (default event log)
//! ```
//!
//! Every function takes the home directory explicitly (`fn_at(home, …)`);
//! callers resolve it once with [`home_dir`]. Tests pass a `TempDir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_DEGRADED_THRESHOLD: u32 = 3;
pub const DEFAULT_ATTRIBUTION_WINDOW_SECS: u64 = 30;

const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Which OS store the state reader talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Windows registry on windows targets, GNOME settings elsewhere.
    #[default]
    Auto,
    Gnome,
    Windows,
    /// JSON state file; portable and used by the integration tests.
    File,
}

/// Contents of `~/.themewatch/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    /// Consecutive failed ticks before the monitor reports `Degraded`.
    pub degraded_threshold: u32,
    pub attribution_window_secs: u64,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            degraded_threshold: DEFAULT_DEGRADED_THRESHOLD,
            attribution_window_secs: DEFAULT_ATTRIBUTION_WINDOW_SECS,
            backend: BackendKind::Auto,
            state_file: None,
            database: None,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn attribution_window(&self) -> Duration {
        Duration::from_secs(self.attribution_window_secs)
    }

    /// Configured state file, or `<home>/.themewatch/theme-state.json`.
    pub fn state_file_at(&self, home: &Path) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| themewatch_root(home).join("theme-state.json"))
    }

    /// Configured database, or `<home>/.themewatch/events.db`.
    pub fn database_at(&self, home: &Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| themewatch_root(home).join("events.db"))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(CoreError::InvalidConfig {
                field: "poll_interval_ms",
                reason: format!(
                    "{} is below the minimum of {MIN_POLL_INTERVAL_MS}",
                    self.poll_interval_ms
                ),
            });
        }
        if self.degraded_threshold == 0 {
            return Err(CoreError::InvalidConfig {
                field: "degraded_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// The user's home directory, or `CoreError::HomeNotFound`.
pub fn home_dir() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

/// `<home>/.themewatch/`
pub fn themewatch_root(home: &Path) -> PathBuf {
    home.join(".themewatch")
}

/// `<home>/.themewatch/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    themewatch_root(home).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.themewatch/config.yaml`.
///
/// A missing file yields [`MonitorConfig::default`]. A malformed file is a
/// `CoreError::Parse` carrying the path and serde_yaml's line context.
pub fn load_at(home: &Path) -> Result<MonitorConfig, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(MonitorConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(MonitorConfig::default());
    }
    let config: MonitorConfig =
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// Atomically save the config.
///
/// Write flow: validate → serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &MonitorConfig) -> Result<(), CoreError> {
    config.validate()?;
    let root = themewatch_root(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let path = config_path_at(home);
    let tmp_path = path.with_file_name(format!("{CONFIG_FILE}.tmp"));
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_path_is_correct() {
        let home = TempDir::new().expect("tempdir");
        assert!(config_path_at(home.path()).ends_with(".themewatch/config.yaml"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn default_paths_live_under_root() {
        let home = TempDir::new().expect("tempdir");
        let config = MonitorConfig::default();
        assert!(config
            .database_at(home.path())
            .ends_with(".themewatch/events.db"));
        assert!(config
            .state_file_at(home.path())
            .ends_with(".themewatch/theme-state.json"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        let config = MonitorConfig {
            poll_interval_ms: 250,
            backend: BackendKind::File,
            state_file: Some(PathBuf::from("/tmp/state.json")),
            ..MonitorConfig::default()
        };
        save_at(home.path(), &config).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), config);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = MonitorConfig {
            degraded_threshold: 0,
            ..MonitorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidConfig {
                field: "degraded_threshold",
                ..
            }
        ));
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(CoreError::HomeNotFound.to_string().contains("home directory"));
    }
}
