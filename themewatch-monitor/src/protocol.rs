use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use themewatch_core::ThemeMode;

use crate::error::{io_err, MonitorError};
use crate::paths::socket_path;

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ThemeMode>,
}

impl DaemonRequest {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            mode: None,
        }
    }

    pub fn with_mode(cmd: &str, mode: ThemeMode) -> Self {
        Self {
            cmd: cmd.to_string(),
            mode: Some(mode),
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, MonitorError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(MonitorError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            MonitorError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(MonitorError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Daemon status, retrying briefly while the socket comes up.
pub fn request_status(home: &Path) -> Result<Value, MonitorError> {
    let request = DaemonRequest::new("status");

    let mut last_not_running: Option<MonitorError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ MonitorError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        MonitorError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_state(home: &Path) -> Result<Value, MonitorError> {
    send_and_unwrap(home, &DaemonRequest::new("state"))
}

pub fn request_enable(home: &Path, mode: ThemeMode) -> Result<Value, MonitorError> {
    send_and_unwrap(home, &DaemonRequest::with_mode("enable", mode))
}

pub fn request_disable(home: &Path) -> Result<Value, MonitorError> {
    send_and_unwrap(home, &DaemonRequest::new("disable"))
}

pub fn request_persistence(home: &Path) -> Result<Value, MonitorError> {
    send_and_unwrap(home, &DaemonRequest::new("persistence"))
}

pub fn request_apply(home: &Path, mode: ThemeMode) -> Result<Value, MonitorError> {
    send_and_unwrap(home, &DaemonRequest::with_mode("apply", mode))
}

pub fn request_stop(home: &Path) -> Result<(), MonitorError> {
    send_and_unwrap(home, &DaemonRequest::new("stop")).map(|_| ())
}

fn send_and_unwrap(home: &Path, request: &DaemonRequest) -> Result<Value, MonitorError> {
    response_into_data(send_request(home, request)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, MonitorError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(MonitorError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}
