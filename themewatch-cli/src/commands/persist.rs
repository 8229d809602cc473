//! `themewatch persist`: persistence mode lives in the daemon, so every
//! subcommand goes over the socket.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::Value;

use themewatch_core::PersistenceConfig;
use themewatch_monitor::{request_disable, request_enable, request_persistence, MonitorError};

use super::{home, mode_label};
use crate::ModeArg;

#[derive(Subcommand, Debug)]
pub enum PersistCommand {
    /// Re-apply MODE whenever something else changes the theme.
    Enable {
        /// light | dark
        mode: ModeArg,
    },
    /// Stop enforcing; changes are still logged.
    Disable,
    /// Show whether persistence is on and which mode it holds.
    Status,
}

pub fn run(command: PersistCommand) -> Result<()> {
    let home = home()?;

    let reply = match command {
        PersistCommand::Enable { mode } => request_enable(&home, mode.into()),
        PersistCommand::Disable => request_disable(&home),
        PersistCommand::Status => request_persistence(&home),
    };
    let data = match reply {
        Ok(data) => data,
        Err(MonitorError::DaemonNotRunning { .. }) => {
            bail!("daemon is not running; start it with `themewatch daemon start`")
        }
        Err(err) => return Err(err).context("persistence request failed"),
    };

    print_config(&parse_config(data)?);
    Ok(())
}

fn parse_config(data: Value) -> Result<PersistenceConfig> {
    serde_json::from_value(data).context("daemon returned malformed persistence config")
}

fn print_config(config: &PersistenceConfig) {
    match config.enforcing() {
        Some(mode) => println!("persistence: enabled ({})", mode_label(mode)),
        None => println!("persistence: disabled"),
    }
}
