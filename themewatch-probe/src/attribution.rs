//! Best-effort attribution of a theme change to a running process.
//!
//! Nothing here is authoritative. The process table is sampled after the
//! change has already happened, the responsible process may have exited, and
//! a recently started process is only circumstantially related. Callers log
//! the answer; they never act on it.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use themewatch_core::UNKNOWN_SOURCE;

/// Processes known to flip the light/dark setting.
const KNOWN_THEME_CHANGERS: &[&str] = &[
    "systemsettings.exe",
    "winlogon.exe",
    "explorer.exe",
    "gnome-control-center",
    "gsd-color",
    "gsettings",
    "dconf",
    "darkman",
    "plasma-apply-colorscheme",
    "systemsettings",
];

/// Grace period after the observation time, for clock granularity.
const START_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Process { name: String },
    Unknown,
}

impl Attribution {
    /// Source label stored on the event.
    pub fn source_label(&self) -> String {
        match self {
            Attribution::Process { name } => name.clone(),
            Attribution::Unknown => UNKNOWN_SOURCE.to_string(),
        }
    }
}

/// Capability: guess which process caused the change observed at `at`.
pub trait ProcessAttributor: Send + Sync {
    fn attribute(&self, at: DateTime<Utc>) -> Attribution;
}

/// Always answers [`Attribution::Unknown`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAttributor;

impl ProcessAttributor for NullAttributor {
    fn attribute(&self, _at: DateTime<Utc>) -> Attribution {
        Attribution::Unknown
    }
}

/// One row of the process table, reduced to what the heuristic needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub started_at: DateTime<Utc>,
}

/// Production attributor backed by `sysinfo`.
#[derive(Debug, Clone)]
pub struct SysinfoAttributor {
    window: Duration,
}

impl SysinfoAttributor {
    /// Only processes started within `window` before the change are
    /// considered "recent".
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    fn snapshot(&self) -> Vec<ProcessSnapshot> {
        let own_pid = sysinfo::get_current_pid().ok();
        let mut system = System::new_with_specifics(RefreshKind::nothing());
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        system
            .processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != own_pid)
            .filter_map(|(pid, process)| {
                let started_at = Utc
                    .timestamp_opt(i64::try_from(process.start_time()).ok()?, 0)
                    .single()?;
                Some(ProcessSnapshot {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().into_owned(),
                    started_at,
                })
            })
            .collect()
    }
}

impl ProcessAttributor for SysinfoAttributor {
    fn attribute(&self, at: DateTime<Utc>) -> Attribution {
        let processes = self.snapshot();
        let attribution = pick_candidate(&processes, at, self.window);
        tracing::debug!(
            candidates = processes.len(),
            source = %attribution.source_label(),
            "attributed theme change",
        );
        attribution
    }
}

/// Choose the most plausible source among `processes` for a change at `at`.
///
/// Order of preference:
/// 1. a known theme changer started within `window` before `at` (latest first)
/// 2. any process started within that window (latest first)
/// 3. any running known theme changer (latest first)
/// 4. [`Attribution::Unknown`]
pub fn pick_candidate(
    processes: &[ProcessSnapshot],
    at: DateTime<Utc>,
    window: Duration,
) -> Attribution {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
    let slack = chrono::Duration::from_std(START_SLACK).unwrap_or_else(|_| chrono::Duration::zero());
    let earliest = at - window;
    let latest = at + slack;

    let recent = |p: &&ProcessSnapshot| p.started_at >= earliest && p.started_at <= latest;
    let known = |p: &&ProcessSnapshot| is_known_changer(&p.name);

    let newest = |candidates: Vec<&ProcessSnapshot>| {
        candidates
            .into_iter()
            .max_by_key(|p| (p.started_at, p.pid))
            .map(|p| Attribution::Process {
                name: p.name.clone(),
            })
    };

    newest(processes.iter().filter(recent).filter(known).collect())
        .or_else(|| newest(processes.iter().filter(recent).collect()))
        .or_else(|| newest(processes.iter().filter(known).collect()))
        .unwrap_or(Attribution::Unknown)
}

fn is_known_changer(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KNOWN_THEME_CHANGERS.iter().any(|known| *known == lower)
}
