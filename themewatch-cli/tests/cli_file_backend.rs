use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn themewatch_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("themewatch"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

/// Home directory configured for the JSON-file backend.
fn file_backed_home() -> TempDir {
    let home = TempDir::new().expect("home");
    let root = home.path().join(".themewatch");
    fs::create_dir_all(&root).expect("create config dir");
    fs::write(root.join("config.yaml"), "backend: file\n").expect("write config");
    home
}

fn state_file(home: &Path) -> std::path::PathBuf {
    home.join(".themewatch").join("theme-state.json")
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("run themewatch");
    assert!(
        output.status.success(),
        "themewatch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

#[test]
fn status_reads_state_file_without_daemon() {
    let home = file_backed_home();
    fs::write(
        state_file(home.path()),
        r#"{"apps_use_light_theme":0,"system_uses_light_theme":1}"#,
    )
    .expect("seed state");

    let stdout = stdout_of(themewatch_cmd(home.path()).args(["status", "--json"]));
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("status JSON");
    assert_eq!(report["backend"], "file");
    assert_eq!(report["state"]["app_mode"], "dark");
    assert_eq!(report["state"]["system_mode"], "light");
    assert_eq!(report["daemon"]["running"], false);
}

#[test]
fn apply_without_daemon_writes_and_logs() {
    let home = file_backed_home();

    themewatch_cmd(home.path())
        .args(["apply", "dark"])
        .assert()
        .success()
        .stdout(contains("applied").and(contains("Dark")));

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(state_file(home.path())).expect("state file"))
            .expect("state JSON");
    assert_eq!(doc["apps_use_light_theme"], 0);
    assert_eq!(doc["system_uses_light_theme"], 0);

    themewatch_cmd(home.path())
        .args(["apply", "DARK"])
        .assert()
        .success()
        .stdout(contains("already"));

    let stdout = stdout_of(themewatch_cmd(home.path()).args(["log", "list", "--json"]));
    let events: serde_json::Value = serde_json::from_str(&stdout).expect("events JSON");
    let events = events.as_array().expect("array");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["cause"], "manual");
    assert_eq!(events[0]["mode"], "dark");
    assert_eq!(events[0]["source_process"], "themewatch (manual)");
}

#[test]
fn log_list_filters_and_renders_table() {
    let home = file_backed_home();
    themewatch_cmd(home.path()).args(["apply", "dark"]).assert().success();
    themewatch_cmd(home.path()).args(["apply", "light"]).assert().success();

    let table = stdout_of(themewatch_cmd(home.path()).args(["log", "list"]));
    assert!(table.contains("themewatch (manual)"), "{table}");
    assert!(table.contains("time (UTC)"), "{table}");

    let stdout = stdout_of(themewatch_cmd(home.path()).args(["log", "list", "--desc", "--json"]));
    let events: Vec<serde_json::Value> = serde_json::from_str(&stdout).expect("events JSON");
    let ids: Vec<i64> = events.iter().map(|e| e["id"].as_i64().expect("id")).collect();
    assert_eq!(ids, vec![2, 1]);

    let stdout = stdout_of(
        themewatch_cmd(home.path()).args(["log", "list", "--mode", "dark", "--json"]),
    );
    let events: Vec<serde_json::Value> = serde_json::from_str(&stdout).expect("events JSON");
    assert_eq!(events.len(), 1);

    themewatch_cmd(home.path())
        .args(["log", "list", "--sort", "colour"])
        .assert()
        .failure()
        .stderr(contains("unknown sort key"));
}

#[test]
fn export_to_file_then_clear() {
    let home = file_backed_home();
    themewatch_cmd(home.path()).args(["apply", "dark"]).assert().success();

    let out = home.path().join("events.csv");
    themewatch_cmd(home.path())
        .args(["log", "export", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stderr(contains("exported 1 events"));

    let csv = fs::read_to_string(&out).expect("csv");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("id,timestamp,mode,source_process,detail,cause")
    );
    let row = lines.next().expect("one row");
    assert!(row.starts_with("1,"), "{row}");
    assert!(row.ends_with(",manual"), "{row}");

    themewatch_cmd(home.path())
        .args(["log", "clear"])
        .assert()
        .success()
        .stdout(contains("cleared 1 events"));

    themewatch_cmd(home.path())
        .args(["log", "export"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "id,timestamp,mode,source_process,detail,cause\r\n",
        ));
}

#[test]
fn persistence_requires_running_daemon() {
    let home = file_backed_home();
    themewatch_cmd(home.path())
        .args(["persist", "enable", "dark"])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));

    themewatch_cmd(home.path())
        .args(["persist", "enable", "sepia"])
        .assert()
        .failure()
        .stderr(contains("unknown theme mode"));
}

#[test]
fn daemon_status_and_stop_when_not_running() {
    let home = file_backed_home();
    themewatch_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
    themewatch_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn invalid_config_is_reported() {
    let home = TempDir::new().expect("home");
    let root = home.path().join(".themewatch");
    fs::create_dir_all(&root).expect("create config dir");
    fs::write(root.join("config.yaml"), "poll_interval_ms: 5\n").expect("write config");

    themewatch_cmd(home.path())
        .args(["log", "list"])
        .assert()
        .failure()
        .stderr(contains("poll_interval_ms"));
}
