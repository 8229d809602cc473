//! `themewatch status`: current theme plus daemon/monitor health.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use themewatch_core::{Health, MonitorStatus, PersistenceConfig, ThemeState};
use themewatch_monitor::{request_status, MonitorError};

use super::{home, mode_label, open_service};

/// Arguments for `themewatch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusReport {
    backend: &'static str,
    state: ThemeState,
    daemon: Value,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let service = open_service(&home)?;
        let state = service
            .current_state()
            .context("failed to read the current theme")?;

        let daemon = match request_status(&home) {
            Ok(status) => status,
            Err(MonitorError::DaemonNotRunning { .. }) => serde_json::json!({ "running": false }),
            Err(err) => return Err(err).context("failed to query daemon status"),
        };

        let report = StatusReport {
            backend: service.backend_name(),
            state,
            daemon,
        };
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &StatusReport) {
    println!(
        "themewatch v{} | backend {}",
        env!("CARGO_PKG_VERSION"),
        report.backend,
    );
    println!(
        "theme: apps {}  system {}",
        mode_label(report.state.app_mode),
        mode_label(report.state.system_mode),
    );

    if report.daemon["running"] != Value::Bool(true) {
        println!("daemon: {}", "not running".bright_black());
        return;
    }

    let monitor: Option<MonitorStatus> = serde_json::from_value(report.daemon["monitor"].clone()).ok();
    let persistence: Option<PersistenceConfig> =
        serde_json::from_value(report.daemon["persistence"].clone()).ok();

    println!("daemon: {}", "running".green());
    if let Some(monitor) = monitor {
        let health = match monitor.health {
            Health::Healthy => "healthy".green().to_string(),
            Health::Degraded => "degraded".red().bold().to_string(),
        };
        println!(
            "monitor: {:?} | {} | {} events recorded",
            monitor.lifecycle, health, monitor.events_recorded,
        );
        if let Some(error) = monitor.last_error {
            println!("last error: {}", error.yellow());
        }
        if monitor.enforcement_paused {
            println!("{}", "enforcement paused until the event log is writable".yellow());
        }
    }
    match persistence.and_then(|p| p.enforcing()) {
        Some(mode) => println!("persistence: enabled ({})", mode_label(mode)),
        None => println!("persistence: disabled"),
    }
}
