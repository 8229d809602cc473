use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use themewatch_core::config::{self, themewatch_root};
use themewatch_core::ThemeMode;

use crate::error::{io_err, MonitorError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::service::ThemeService;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), MonitorError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the monitor and its control socket until `stop` or ctrl-c.
pub async fn run(home: PathBuf) -> Result<(), MonitorError> {
    let root = themewatch_root(&home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let config = config::load_at(&home)?;
    let service = {
        let home = home.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || ThemeService::open(&home, &config))
            .await
            .map_err(|err| MonitorError::Protocol(format!("service setup join error: {err}")))??
    };
    let service = Arc::new(service);
    service.start_monitoring()?;
    tracing::info!(
        backend = service.backend_name(),
        interval_ms = config.poll_interval_ms,
        "themewatch daemon running",
    );

    let started_at = Utc::now();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                service,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(MonitorError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    service.stop_monitoring().await?;

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    service: Arc<ThemeService>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at: DateTime<Utc>,
) -> Result<(), MonitorError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let service = Arc::clone(&service);
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, service, shutdown_tx, started_at).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    service: Arc<ThemeService>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: DateTime<Utc>,
) -> Result<(), MonitorError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            _ => dispatch(&home, &service, &request, started_at).await,
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    home: &Path,
    service: &Arc<ThemeService>,
    request: &DaemonRequest,
    started_at: DateTime<Utc>,
) -> DaemonResponse {
    let outcome = match request.cmd.as_str() {
        "status" => Ok(build_status_payload(home, service, started_at)),
        "state" => {
            let service = Arc::clone(service);
            run_blocking(move || service.current_state().map(|state| json!(state))).await
        }
        "persistence" => Ok(json!(service.persistence_status())),
        "enable" => match require_mode(request) {
            Ok(mode) => Ok(json!(service.enable_persistence(mode))),
            Err(err) => Err(err),
        },
        "disable" => Ok(json!(service.disable_persistence())),
        "apply" => match require_mode(request) {
            Ok(mode) => {
                let service = Arc::clone(service);
                run_blocking(move || {
                    service
                        .apply_theme(mode)
                        .map(|event| json!({ "mode": mode, "event": event }))
                })
                .await
            }
            Err(err) => Err(err),
        },
        other => Err(MonitorError::Protocol(format!("unknown command '{other}'"))),
    };

    match outcome {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(err.to_string()),
    }
}

fn require_mode(request: &DaemonRequest) -> Result<ThemeMode, MonitorError> {
    request.mode.ok_or_else(|| {
        MonitorError::Protocol(format!("command '{}' requires a mode", request.cmd))
    })
}

async fn run_blocking<F>(work: F) -> Result<Value, MonitorError>
where
    F: FnOnce() -> Result<Value, MonitorError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| MonitorError::Protocol(format!("request task join error: {err}")))?
}

fn build_status_payload(home: &Path, service: &ThemeService, started_at: DateTime<Utc>) -> Value {
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": started_at,
        "backend": service.backend_name(),
        "monitor": service.monitor_status(),
        "persistence": service.persistence_status(),
        "socket": socket_path(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), MonitorError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(MonitorError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), MonitorError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), MonitorError>, tokio::task::JoinError>,
) -> Result<(), MonitorError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(MonitorError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the `RUST_LOG`-driven fmt subscriber; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), MonitorError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), MonitorError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;
    use themewatch_core::{BackendKind, MonitorConfig};
    use themewatch_probe::{MemoryStateReader, NullAttributor};
    use themewatch_store::EventStore;

    fn memory_service(mode: ThemeMode) -> Arc<ThemeService> {
        Arc::new(ThemeService::new(
            Arc::new(MemoryStateReader::new(mode)),
            Arc::new(NullAttributor),
            Arc::new(EventStore::open_in_memory().expect("store")),
            &MonitorConfig::default(),
        ))
    }

    #[tokio::test]
    async fn dispatch_persistence_commands() {
        let home = TempDir::new().expect("home");
        let service = memory_service(ThemeMode::Light);

        let enabled = dispatch(
            home.path(),
            &service,
            &DaemonRequest::with_mode("enable", ThemeMode::Dark),
            Utc::now(),
        )
        .await;
        assert!(enabled.ok);
        assert_eq!(enabled.data.unwrap()["desired_mode"], json!("dark"));

        let status = dispatch(
            home.path(),
            &service,
            &DaemonRequest::new("persistence"),
            Utc::now(),
        )
        .await;
        assert_eq!(status.data.unwrap()["enabled"], json!(true));

        let missing =
            dispatch(home.path(), &service, &DaemonRequest::new("enable"), Utc::now()).await;
        assert!(!missing.ok);
        assert!(missing.error.unwrap().contains("requires a mode"));
    }

    #[tokio::test]
    async fn dispatch_apply_and_state() {
        let home = TempDir::new().expect("home");
        let service = memory_service(ThemeMode::Light);

        let applied = dispatch(
            home.path(),
            &service,
            &DaemonRequest::with_mode("apply", ThemeMode::Dark),
            Utc::now(),
        )
        .await;
        assert!(applied.ok, "{:?}", applied.error);
        assert_eq!(applied.data.unwrap()["event"]["cause"], json!("manual"));

        let state = dispatch(home.path(), &service, &DaemonRequest::new("state"), Utc::now())
            .await
            .data
            .unwrap();
        assert_eq!(state["app_mode"], json!("dark"));
        assert_eq!(state["system_mode"], json!("dark"));
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_response() {
        let home = TempDir::new().expect("home");
        let service = memory_service(ThemeMode::Light);
        let response =
            dispatch(home.path(), &service, &DaemonRequest::new("reboot"), Utc::now()).await;
        assert_eq!(
            response.error.as_deref(),
            Some("daemon protocol error: unknown command 'reboot'")
        );
    }

    #[tokio::test]
    async fn daemon_serves_status_and_stops_over_socket() {
        let home = TempDir::new().expect("home");
        let config = MonitorConfig {
            backend: BackendKind::File,
            poll_interval_ms: 50,
            ..MonitorConfig::default()
        };
        config::save_at(home.path(), &config).expect("save config");

        let daemon = tokio::spawn(run(home.path().to_path_buf()));
        let home_path = home.path().to_path_buf();
        let status = tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                if let Ok(status) = crate::protocol::request_status(&home_path) {
                    return Some(status);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            None
        })
        .await
        .expect("join")
        .expect("daemon answered status");
        assert_eq!(status["backend"], json!("file"));
        assert_eq!(status["monitor"]["lifecycle"], json!("running"));

        let home_path = home.path().to_path_buf();
        tokio::task::spawn_blocking(move || crate::protocol::request_stop(&home_path))
            .await
            .expect("join")
            .expect("stop");
        daemon.await.expect("join").expect("daemon exits cleanly");
        assert!(!socket_path(home.path()).exists());
    }
}
