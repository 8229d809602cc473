//! Domain types shared by every themewatch crate.
//!
//! Snapshots ([`ThemeState`]) and log records ([`ThemeEvent`]) are immutable
//! values; nothing in the workspace mutates one after it is produced.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Source label recorded when attribution finds no plausible process.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Monotonic surrogate key assigned by the event store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Binary light/dark value tracked by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    /// Decode the `*UsesLightTheme` convention: non-zero means light.
    pub fn from_light_flag(flag: u32) -> Self {
        if flag == 0 {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }
    }

    pub fn light_flag(self) -> u32 {
        match self {
            ThemeMode::Light => 1,
            ThemeMode::Dark => 0,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeMode::Light => write!(f, "Light"),
            ThemeMode::Dark => write!(f, "Dark"),
        }
    }
}

impl FromStr for ThemeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

/// Why an event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCause {
    /// A change that originated outside the monitor.
    External,
    /// The monitor's own corrective write while persistence is enabled.
    Enforced,
    /// A write requested through the control surface.
    Manual,
}

impl EventCause {
    pub fn as_str(self) -> &'static str {
        match self {
            EventCause::External => "external",
            EventCause::Enforced => "enforced",
            EventCause::Manual => "manual",
        }
    }
}

impl fmt::Display for EventCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(EventCause::External),
            "enforced" => Ok(EventCause::Enforced),
            "manual" => Ok(EventCause::Manual),
            other => Err(format!(
                "unknown event cause '{other}'; expected: external, enforced, manual"
            )),
        }
    }
}

/// Monitor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Monitor health as seen by the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    #[default]
    Healthy,
    Degraded,
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One sample of the monitored settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeState {
    pub app_mode: ThemeMode,
    pub system_mode: ThemeMode,
    pub observed_at: DateTime<Utc>,
}

impl ThemeState {
    pub fn new(app_mode: ThemeMode, system_mode: ThemeMode) -> Self {
        Self {
            app_mode,
            system_mode,
            observed_at: Utc::now(),
        }
    }

    /// Both settings at `mode`.
    pub fn uniform(mode: ThemeMode) -> Self {
        Self::new(mode, mode)
    }

    /// Value equality on the two monitored fields; `observed_at` is ignored.
    pub fn same_modes(&self, other: &ThemeState) -> bool {
        self.app_mode == other.app_mode && self.system_mode == other.system_mode
    }

    /// True when either setting differs from `mode`.
    pub fn deviates_from(&self, mode: ThemeMode) -> bool {
        self.app_mode != mode || self.system_mode != mode
    }

    /// `apps: Light -> Dark, system: Light -> Dark`
    pub fn describe_transition(&self, to: &ThemeState) -> String {
        format!(
            "apps: {} -> {}, system: {} -> {}",
            self.app_mode, to.app_mode, self.system_mode, to.system_mode
        )
    }
}

/// An event that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThemeEvent {
    pub timestamp: DateTime<Utc>,
    pub mode: ThemeMode,
    pub source_process: String,
    pub detail: String,
    pub cause: EventCause,
}

/// A persisted log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub mode: ThemeMode,
    pub source_process: String,
    pub detail: String,
    pub cause: EventCause,
}

/// Enforcement settings read by the monitor on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub desired_mode: Option<ThemeMode>,
}

impl PersistenceConfig {
    pub fn enabled(desired_mode: ThemeMode) -> Self {
        Self {
            enabled: true,
            desired_mode: Some(desired_mode),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// The mode to enforce, if enforcement is active.
    pub fn enforcing(&self) -> Option<ThemeMode> {
        if self.enabled {
            self.desired_mode
        } else {
            None
        }
    }
}

/// Observable monitor status published to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MonitorStatus {
    pub lifecycle: Lifecycle,
    pub health: Health,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<DateTime<Utc>>,
    pub events_recorded: u64,
    pub enforcement_paused: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
