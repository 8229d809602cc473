//! Config file error-message, atomic-write-safety, and default-resolution tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

use themewatch_core::{config, BackendKind, CoreError, MonitorConfig};

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".themewatch/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(
        err.to_string().contains("config.yaml"),
        "must contain file path, got: {err}"
    );
}

#[test]
fn load_unknown_backend_is_a_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".themewatch/config.yaml")
        .write_str("backend: kde\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
}

#[test]
fn load_rejects_too_fast_polling() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".themewatch/config.yaml")
        .write_str("poll_interval_ms: 5\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"), "got: {err}");
}

#[test]
fn empty_file_yields_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".themewatch/config.yaml")
        .write_str("\n")
        .expect("write");
    assert_eq!(
        config::load_at(home.path()).expect("load"),
        MonitorConfig::default()
    );
}

// ---------------------------------------------------------------------------
// 2. Partial files fall back per field
// ---------------------------------------------------------------------------

#[rstest]
#[case("backend: file\n", BackendKind::File, 500)]
#[case("backend: gnome\npoll_interval_ms: 1000\n", BackendKind::Gnome, 1000)]
#[case("poll_interval_ms: 200\n", BackendKind::Auto, 200)]
fn partial_config_keeps_defaults_for_missing_fields(
    #[case] yaml: &str,
    #[case] backend: BackendKind,
    #[case] interval_ms: u64,
) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".themewatch/config.yaml")
        .write_str(yaml)
        .expect("write");

    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded.backend, backend);
    assert_eq!(loaded.poll_interval_ms, interval_ms);
    assert_eq!(loaded.degraded_threshold, 3);
}

// ---------------------------------------------------------------------------
// 3. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &MonitorConfig::default()).expect("save");

    home.child(".themewatch/config.yaml")
        .assert(predicate::path::exists());
    home.child(".themewatch/config.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn save_refuses_invalid_config_and_leaves_original() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &MonitorConfig::default()).expect("save");
    let path = config::config_path_at(home.path());
    let original = fs::read(&path).expect("read original");

    let bad = MonitorConfig {
        degraded_threshold: 0,
        ..MonitorConfig::default()
    };
    assert!(config::save_at(home.path(), &bad).is_err());
    assert_eq!(fs::read(&path).expect("read after"), original);
}

#[cfg(unix)]
#[test]
fn saved_config_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &MonitorConfig::default()).expect("save");
    let mode = fs::metadata(config::config_path_at(home.path()))
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
