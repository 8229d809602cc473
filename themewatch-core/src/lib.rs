//! Themewatch core library: domain types, config file, errors.
//!
//! Public API surface:
//! - [`types`]: theme snapshots, events, persistence config, monitor status
//! - [`error`]: [`CoreError`]
//! - [`config`]: load / save of `~/.themewatch/config.yaml`

pub mod config;
pub mod error;
pub mod types;

pub use config::{BackendKind, MonitorConfig};
pub use error::CoreError;
pub use types::{
    EventCause, EventId, Health, Lifecycle, MonitorStatus, NewThemeEvent, PersistenceConfig,
    ThemeEvent, ThemeMode, ThemeState, UNKNOWN_SOURCE,
};
