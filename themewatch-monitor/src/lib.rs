//! Monitoring core: tick engine, lifecycle, persistence mode, and the daemon
//! that exposes them over a Unix socket.

pub mod engine;
mod error;
pub mod monitor;
pub mod paths;
pub mod persistence;
pub mod protocol;
mod runtime;
pub mod service;

pub use engine::{MonitorSignal, TickEngine, TickOutcome, MANUAL_SOURCE, PERSISTENCE_SOURCE};
pub use error::MonitorError;
pub use monitor::Monitor;
pub use persistence::PersistenceController;
pub use protocol::{
    request_apply, request_disable, request_enable, request_persistence, request_state,
    request_status, request_stop, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking};
pub use service::ThemeService;
