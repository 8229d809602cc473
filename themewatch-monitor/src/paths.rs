use std::path::{Path, PathBuf};

use themewatch_core::config::themewatch_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    themewatch_root(home).join(DAEMON_SOCKET)
}
