//! The poll → diff → attribute → log → enforce cycle.
//!
//! [`TickEngine`] is synchronous and owns the previous-state cache. The
//! async [`crate::Monitor`] drives it on the blocking pool; tests drive it
//! directly. Exactly one engine call runs at a time because the engine sits
//! behind a mutex, which is what makes the corrective write and the
//! re-baselining of the previous state a single step.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use themewatch_core::{
    EventCause, Health, MonitorStatus, NewThemeEvent, PersistenceConfig, ThemeEvent, ThemeMode,
    ThemeState,
};
use themewatch_probe::{ProcessAttributor, StateReader};
use themewatch_store::EventStore;

use crate::error::MonitorError;

/// Source recorded on events produced by a corrective write.
pub const PERSISTENCE_SOURCE: &str = "themewatch (persistence)";
/// Source recorded on events produced by an explicit apply request.
pub const MANUAL_SOURCE: &str = "themewatch (manual)";

/// Notifications for subscribers of a running monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorSignal {
    Event(ThemeEvent),
    DegradedTick { error: String },
    HealthChanged(Health),
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// First sample after start; recorded as the baseline, nothing logged.
    Seeded,
    Unchanged,
    /// Events appended this tick, oldest first.
    Recorded(Vec<ThemeEvent>),
    /// The tick hit an error. `recorded` holds anything appended before
    /// it did.
    Failed {
        error: String,
        recorded: Vec<ThemeEvent>,
    },
}

#[derive(Debug, Clone, Copy)]
enum FailureKind {
    Sample,
    Write,
    Storage,
}

impl FailureKind {
    fn as_str(self) -> &'static str {
        match self {
            FailureKind::Sample => "sample",
            FailureKind::Write => "write",
            FailureKind::Storage => "storage",
        }
    }
}

pub struct TickEngine {
    reader: Arc<dyn StateReader>,
    attributor: Arc<dyn ProcessAttributor>,
    store: Arc<EventStore>,
    persistence: Arc<RwLock<PersistenceConfig>>,
    status: Arc<watch::Sender<MonitorStatus>>,
    signals: broadcast::Sender<MonitorSignal>,
    degraded_threshold: u32,
    previous: Option<ThemeState>,
    /// A deviation whose External event is already logged but whose
    /// corrective write has not succeeded yet.
    uncorrected: Option<ThemeState>,
}

impl TickEngine {
    pub fn new(
        reader: Arc<dyn StateReader>,
        attributor: Arc<dyn ProcessAttributor>,
        store: Arc<EventStore>,
        persistence: Arc<RwLock<PersistenceConfig>>,
        degraded_threshold: u32,
    ) -> Self {
        let (status, _) = watch::channel(MonitorStatus::default());
        let (signals, _) = broadcast::channel(64);
        Self {
            reader,
            attributor,
            store,
            persistence,
            status: Arc::new(status),
            signals,
            degraded_threshold: degraded_threshold.max(1),
            previous: None,
            uncorrected: None,
        }
    }

    pub fn status_sender(&self) -> Arc<watch::Sender<MonitorStatus>> {
        Arc::clone(&self.status)
    }

    pub fn signal_sender(&self) -> broadcast::Sender<MonitorSignal> {
        self.signals.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorSignal> {
        self.signals.subscribe()
    }

    pub fn previous(&self) -> Option<&ThemeState> {
        self.previous.as_ref()
    }

    /// Forget the baseline so the next tick seeds it again.
    pub fn reset_baseline(&mut self) {
        self.previous = None;
        self.uncorrected = None;
    }

    pub fn tick(&mut self) -> TickOutcome {
        let cur = match self.reader.sample() {
            Ok(state) => state,
            Err(err) => {
                return self.record_failure(FailureKind::Sample, err.to_string(), Vec::new())
            }
        };
        self.status
            .send_modify(|s| s.last_tick_at = Some(cur.observed_at));

        let Some(prev) = self.previous.clone() else {
            tracing::info!(
                apps = %cur.app_mode,
                system = %cur.system_mode,
                reader = self.reader.name(),
                "recorded baseline theme state",
            );
            self.previous = Some(cur);
            self.record_success();
            return TickOutcome::Seeded;
        };

        let desired = self.persistence_snapshot().enforcing();
        let deviation = desired.filter(|mode| cur.deviates_from(*mode));

        if cur.same_modes(&prev) && deviation.is_none() {
            self.uncorrected = None;
            self.record_success();
            return TickOutcome::Unchanged;
        }

        let mut recorded = Vec::with_capacity(2);

        let already_logged = self
            .uncorrected
            .as_ref()
            .is_some_and(|logged| logged.same_modes(&cur));
        if !already_logged {
            let source = self.attributor.attribute(cur.observed_at).source_label();
            let event = NewThemeEvent {
                timestamp: cur.observed_at,
                mode: cur.app_mode,
                source_process: source,
                detail: prev.describe_transition(&cur),
                cause: EventCause::External,
            };
            match self.append(&event) {
                Ok(stored) => recorded.push(stored),
                Err(err) => {
                    return self.record_failure(FailureKind::Storage, err.to_string(), recorded)
                }
            }
        }

        let Some(desired) = deviation else {
            self.uncorrected = None;
            self.previous = Some(cur);
            self.record_success();
            return TickOutcome::Recorded(recorded);
        };

        if let Err(err) = self.reader.write(desired) {
            self.uncorrected = Some(cur);
            return self.record_failure(FailureKind::Write, err.to_string(), recorded);
        }
        // A backend can accept a write that the store then ignores; the
        // baseline only moves once the store reads back the desired mode.
        if let Ok(after) = self.reader.sample() {
            if after.deviates_from(desired) {
                self.uncorrected = Some(cur);
                let error = format!(
                    "{} accepted a write of {desired} but still reads apps: {}, system: {}",
                    self.reader.name(),
                    after.app_mode,
                    after.system_mode,
                );
                return self.record_failure(FailureKind::Write, error, recorded);
            }
        }
        self.uncorrected = None;

        let corrected = ThemeState::uniform(desired);
        let event = NewThemeEvent {
            timestamp: corrected.observed_at,
            mode: desired,
            source_process: PERSISTENCE_SOURCE.to_string(),
            detail: cur.describe_transition(&corrected),
            cause: EventCause::Enforced,
        };
        // The write already happened; the baseline must follow it even when
        // the log entry cannot be stored.
        self.previous = Some(corrected);
        match self.append(&event) {
            Ok(stored) => {
                tracing::info!(mode = %desired, "re-asserted desired theme");
                recorded.push(stored);
                self.record_success();
                TickOutcome::Recorded(recorded)
            }
            Err(err) => self.record_failure(FailureKind::Storage, err.to_string(), recorded),
        }
    }

    /// Write `mode` on request and log it as a manual change.
    ///
    /// Returns `None` when the store already holds `mode`. Failures go to
    /// the caller and do not count against monitor health.
    pub fn apply_manual(&mut self, mode: ThemeMode) -> Result<Option<ThemeEvent>, MonitorError> {
        let cur = self.reader.sample()?;
        if !cur.deviates_from(mode) {
            return Ok(None);
        }
        self.reader.write(mode)?;

        let applied = ThemeState::uniform(mode);
        let event = NewThemeEvent {
            timestamp: applied.observed_at,
            mode,
            source_process: MANUAL_SOURCE.to_string(),
            detail: cur.describe_transition(&applied),
            cause: EventCause::Manual,
        };
        if self.previous.is_some() {
            self.previous = Some(applied);
        }
        self.uncorrected = None;
        let stored = self.append(&event)?;
        tracing::info!(mode = %mode, "applied theme manually");
        Ok(Some(stored))
    }

    fn persistence_snapshot(&self) -> PersistenceConfig {
        *self
            .persistence
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append(&self, event: &NewThemeEvent) -> Result<ThemeEvent, themewatch_store::StorageError> {
        let stored = self.store.append(event)?;
        tracing::info!(
            id = %stored.id,
            mode = %stored.mode,
            cause = %stored.cause,
            source = %stored.source_process,
            "theme change recorded",
        );
        self.status.send_modify(|s| {
            s.events_recorded += 1;
            if s.enforcement_paused {
                tracing::info!("event log writable again, enforcement resumed");
                s.enforcement_paused = false;
            }
        });
        let _ = self.signals.send(MonitorSignal::Event(stored.clone()));
        Ok(stored)
    }

    fn record_success(&self) {
        let mut recovered = false;
        self.status.send_modify(|s| {
            s.consecutive_failures = 0;
            if s.health == Health::Degraded {
                s.health = Health::Healthy;
                recovered = true;
            }
        });
        if recovered {
            tracing::info!("monitor recovered");
            let _ = self.signals.send(MonitorSignal::HealthChanged(Health::Healthy));
        }
    }

    fn record_failure(
        &self,
        kind: FailureKind,
        error: String,
        recorded: Vec<ThemeEvent>,
    ) -> TickOutcome {
        let threshold = self.degraded_threshold;
        let mut escalated = false;
        let mut failures = 0;
        self.status.send_modify(|s| {
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            s.last_error = Some(error.clone());
            failures = s.consecutive_failures;
            if let FailureKind::Storage = kind {
                s.enforcement_paused = true;
            }
            if s.consecutive_failures >= threshold && s.health == Health::Healthy {
                s.health = Health::Degraded;
                escalated = true;
            }
        });

        tracing::warn!(
            stage = kind.as_str(),
            failures,
            error = %error,
            "degraded tick",
        );
        let _ = self.signals.send(MonitorSignal::DegradedTick {
            error: error.clone(),
        });
        if escalated {
            tracing::error!(failures, "monitor degraded");
            let _ = self.signals.send(MonitorSignal::HealthChanged(Health::Degraded));
        }
        self.status.send_modify(|s| s.last_tick_at = Some(Utc::now()));

        TickOutcome::Failed { error, recorded }
    }
}
