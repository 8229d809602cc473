pub mod apply;
pub mod daemon;
pub mod log;
pub mod persist;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use themewatch_core::{config, ThemeMode};
use themewatch_monitor::ThemeService;

pub(crate) fn home() -> Result<PathBuf> {
    config::home_dir().context("could not determine home directory")
}

/// Service over the configured backend and event log, without a running monitor.
pub(crate) fn open_service(home: &std::path::Path) -> Result<ThemeService> {
    let config = config::load_at(home).context("failed to load ~/.themewatch/config.yaml")?;
    ThemeService::open(home, &config).context("failed to open theme service")
}

pub(crate) fn mode_label(mode: ThemeMode) -> String {
    match mode {
        ThemeMode::Light => "Light".yellow().bold().to_string(),
        ThemeMode::Dark => "Dark".bright_blue().bold().to_string(),
    }
}
