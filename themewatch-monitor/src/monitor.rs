//! Lifecycle around the tick engine: `Idle → Running → Stopped`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use themewatch_core::{Lifecycle, MonitorStatus};

use crate::engine::{MonitorSignal, TickEngine};
use crate::error::MonitorError;

struct RunningLoop {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic driver for a [`TickEngine`].
///
/// Ticks are not reentrant: each one runs to completion on the blocking
/// pool before the interval is polled again, and ticks that fall due in the
/// meantime are skipped rather than queued.
pub struct Monitor {
    engine: Arc<Mutex<TickEngine>>,
    status: Arc<watch::Sender<MonitorStatus>>,
    signals: broadcast::Sender<MonitorSignal>,
    poll_interval: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl Monitor {
    pub fn new(engine: TickEngine, poll_interval: Duration) -> Self {
        let status = engine.status_sender();
        let signals = engine.signal_sender();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            status,
            signals,
            poll_interval,
            running: Mutex::new(None),
        }
    }

    /// Shared handle to the engine, for operations that must serialise with
    /// ticks (manual applies).
    pub fn engine(&self) -> Arc<Mutex<TickEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorSignal> {
        self.signals.subscribe()
    }

    /// Begin ticking. Allowed from `Idle` and from `Stopped`; the first tick
    /// after a start records a fresh baseline.
    pub fn start(&self) -> Result<(), MonitorError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;
        let mut running = self.lock_running();
        if running.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(tick_loop(
            Arc::clone(&self.engine),
            self.poll_interval,
            shutdown_rx,
        ));
        *running = Some(RunningLoop { shutdown, handle });
        self.status.send_modify(|s| s.lifecycle = Lifecycle::Running);
        tracing::info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            "monitor started"
        );
        Ok(())
    }

    /// Stop ticking and wait for an in-flight tick to finish. Once this
    /// returns no further events are emitted. A no-op unless running.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let Some(running) = self.lock_running().take() else {
            return Ok(());
        };
        let _ = running.shutdown.send(());
        let joined = running.handle.await;
        self.status.send_modify(|s| s.lifecycle = Lifecycle::Stopped);
        tracing::info!("monitor stopped");
        joined.map_err(|err| MonitorError::Protocol(format!("tick loop join failure: {err}")))
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningLoop>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn lock_engine(engine: &Mutex<TickEngine>) -> MutexGuard<'_, TickEngine> {
    engine
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn tick_loop(
    engine: Arc<Mutex<TickEngine>>,
    poll_interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // The engine lock may be held by a slow manual apply; never wait for it
    // on a runtime worker.
    let reset = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || lock_engine(&engine).reset_baseline()).await
    };
    if let Err(err) = reset {
        tracing::error!(error = %err, "baseline reset failed");
        return;
    }

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = interval.tick() => {
                let engine = Arc::clone(&engine);
                let ticked = tokio::task::spawn_blocking(move || lock_engine(&engine).tick()).await;
                if let Err(err) = ticked {
                    tracing::error!(error = %err, "tick task failed");
                }
            }
        }
    }
}
