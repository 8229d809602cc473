//! themewatch: watch, log and pin the desktop light/dark theme.
//!
//! # Usage
//!
//! ```text
//! themewatch status [--json]
//! themewatch daemon start|stop|status
//! themewatch persist enable <light|dark> | disable | status
//! themewatch apply <light|dark>
//! themewatch log list [--mode M] [--cause C] [--source S] [--sort KEY] [--desc] [--limit N] [--offset N] [--json]
//! themewatch log export [--output FILE]
//! themewatch log clear
//! ```

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, daemon::DaemonCommand, log::LogCommand, persist::PersistCommand,
    status::StatusArgs,
};
use themewatch_core::ThemeMode;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "themewatch",
    version,
    about = "Monitor, log and enforce the desktop light/dark theme",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the current theme and monitor status.
    Status(StatusArgs),

    /// Run or control the monitoring daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Pin the theme to one mode, re-applying it whenever something changes it.
    Persist {
        #[command(subcommand)]
        command: PersistCommand,
    },

    /// Set the theme now and record it in the log.
    Apply(ApplyArgs),

    /// Inspect, export or clear the change log.
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },
}

// ---------------------------------------------------------------------------
// Shared ThemeMode argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `ThemeMode` from CLI args.
#[derive(Debug, Clone, Copy)]
pub struct ModeArg(pub ThemeMode);

impl FromStr for ModeArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<ThemeMode>()
            .map(Self)
            .map_err(|_| format!("unknown theme mode '{s}'; expected: light, dark"))
    }
}

impl fmt::Display for ModeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ModeArg> for ThemeMode {
    fn from(m: ModeArg) -> Self {
        m.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Persist { command } => commands::persist::run(command),
        Commands::Apply(args) => args.run(),
        Commands::Log { command } => commands::log::run(command),
    }
}
