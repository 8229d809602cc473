//! `themewatch apply <mode>`

use anyhow::{Context, Result};
use clap::Args;

use themewatch_core::{ThemeEvent, ThemeMode};
use themewatch_monitor::{request_apply, MonitorError};

use super::{home, mode_label, open_service};
use crate::ModeArg;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// light | dark
    pub mode: ModeArg,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let mode: ThemeMode = self.mode.into();

        // Through the daemon when it runs, so the write is serialised with
        // its ticks; directly otherwise.
        let event = match request_apply(&home, mode) {
            Ok(data) => serde_json::from_value::<Option<ThemeEvent>>(data["event"].clone())
                .context("daemon returned malformed event")?,
            Err(MonitorError::DaemonNotRunning { .. }) => open_service(&home)?
                .apply_theme(mode)
                .context("failed to apply theme")?,
            Err(err) => return Err(err).context("apply request failed"),
        };

        match event {
            Some(event) => println!("applied {} (event #{})", mode_label(mode), event.id),
            None => println!("theme already {}", mode_label(mode)),
        }
        Ok(())
    }
}
