//! Control surface for UI and CLI collaborators.
//!
//! [`ThemeService`] is the only type outside the engine that touches the
//! state reader or the event log. The daemon wraps one; the CLI builds one
//! directly for log maintenance when no daemon is needed.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use themewatch_core::{
    MonitorConfig, MonitorStatus, PersistenceConfig, ThemeEvent, ThemeMode, ThemeState,
};
use themewatch_probe::{reader_for, ProcessAttributor, StateReader, SysinfoAttributor};
use themewatch_store::{EventFilter, EventQuery, EventStore};

use crate::engine::{MonitorSignal, TickEngine};
use crate::error::MonitorError;
use crate::monitor::{lock_engine, Monitor};
use crate::persistence::PersistenceController;

pub struct ThemeService {
    reader: Arc<dyn StateReader>,
    store: Arc<EventStore>,
    persistence: PersistenceController,
    monitor: Monitor,
}

impl ThemeService {
    pub fn new(
        reader: Arc<dyn StateReader>,
        attributor: Arc<dyn ProcessAttributor>,
        store: Arc<EventStore>,
        config: &MonitorConfig,
    ) -> Self {
        let persistence = PersistenceController::new();
        let engine = TickEngine::new(
            Arc::clone(&reader),
            attributor,
            Arc::clone(&store),
            persistence.shared(),
            config.degraded_threshold,
        );
        Self {
            reader,
            store,
            persistence,
            monitor: Monitor::new(engine, config.poll_interval()),
        }
    }

    /// Wire up the configured backend, the process-table attributor, and the
    /// on-disk event log under `home`.
    pub fn open(home: &Path, config: &MonitorConfig) -> Result<Self, MonitorError> {
        let reader: Arc<dyn StateReader> = Arc::from(reader_for(config, home));
        let attributor = Arc::new(SysinfoAttributor::new(config.attribution_window()));
        let store = Arc::new(EventStore::open_at(&config.database_at(home))?);
        tracing::debug!(backend = reader.name(), "theme service ready");
        Ok(Self::new(reader, attributor, store, config))
    }

    pub fn backend_name(&self) -> &'static str {
        self.reader.name()
    }

    pub fn start_monitoring(&self) -> Result<(), MonitorError> {
        self.monitor.start()
    }

    pub async fn stop_monitoring(&self) -> Result<(), MonitorError> {
        self.monitor.stop().await
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        self.monitor.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<MonitorStatus> {
        self.monitor.watch_status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorSignal> {
        self.monitor.subscribe()
    }

    /// Fresh sample from the OS store; does not touch the monitor baseline.
    pub fn current_state(&self) -> Result<ThemeState, MonitorError> {
        Ok(self.reader.sample()?)
    }

    pub fn enable_persistence(&self, mode: ThemeMode) -> PersistenceConfig {
        self.persistence.enable(mode)
    }

    pub fn disable_persistence(&self) -> PersistenceConfig {
        self.persistence.disable()
    }

    pub fn persistence_status(&self) -> PersistenceConfig {
        self.persistence.status()
    }

    /// Write `mode` now, serialised with any in-flight tick. `None` when the
    /// store already held `mode`.
    pub fn apply_theme(&self, mode: ThemeMode) -> Result<Option<ThemeEvent>, MonitorError> {
        let engine = self.monitor.engine();
        let mut engine = lock_engine(&engine);
        engine.apply_manual(mode)
    }

    pub fn query_events(&self, query: &EventQuery) -> Result<Vec<ThemeEvent>, MonitorError> {
        Ok(self.store.query(query)?)
    }

    pub fn count_events(&self, filter: &EventFilter) -> Result<u64, MonitorError> {
        Ok(self.store.count(filter)?)
    }

    /// CSV of the whole log, oldest first. Returns the number of rows.
    pub fn export_events<W: Write>(&self, out: W) -> Result<usize, MonitorError> {
        Ok(self.store.export_csv(out)?)
    }

    pub fn clear_events(&self) -> Result<u64, MonitorError> {
        Ok(self.store.clear()?)
    }
}
