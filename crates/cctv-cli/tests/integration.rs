#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cctv(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cctv").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CCTV_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(dir.path().join("cctv.yaml"), yaml).unwrap();
}

fn write_log(dir: &TempDir, classes: &[&str]) {
    let records: Vec<serde_json::Value> = classes
        .iter()
        .map(|c| {
            serde_json::json!({
                "timestamp": "2024-05-01 12:30:05",
                "class": c,
                "confidence": 0.875,
                "camera_idx": 0,
            })
        })
        .collect();
    std::fs::write(
        dir.path().join("detection_log.json"),
        serde_json::to_vec_pretty(&records).unwrap(),
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("cameras"))
        .stdout(predicate::str::contains("log"))
        .stdout(predicate::str::contains("config"));
}

// ---------------------------------------------------------------------------
// cctv config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    let written = std::fs::read_to_string(dir.path().join("cctv.yaml")).unwrap();
    assert!(written.contains("port: 5000"));

    std::fs::write(dir.path().join("cctv.yaml"), "server:\n  port: 8080\n").unwrap();
    cctv(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    let kept = std::fs::read_to_string(dir.path().join("cctv.yaml")).unwrap();
    assert!(kept.contains("8080"));
}

#[test]
fn config_show_uses_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 5000"))
        .stdout(predicate::str::contains("detection_log.json"));
}

#[test]
fn config_show_json_merges_file_with_defaults() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server:\n  port: 8080\ncamera:\n  fps: 10\n");

    let output = cctv(&dir)
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["server"]["port"], 8080);
    assert_eq!(json["server"]["host"], "0.0.0.0");
    assert_eq!(json["camera"]["fps"], 10);
    assert_eq!(json["camera"]["width"], 640);
    assert_eq!(json["log"]["capacity"], 1000);
}

#[test]
fn config_flag_and_env_select_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("other.yaml"), "server:\n  port: 9000\n").unwrap();

    cctv(&dir)
        .args(["--config", "other.yaml", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 9000"));

    cctv(&dir)
        .env("CCTV_CONFIG", "other.yaml")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 9000"));
}

#[test]
fn config_check_passes_for_defaults() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[error]").not());
}

#[test]
fn config_check_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "camera:\n  fps: 0\n  jpeg_quality: 0\n");
    cctv(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] camera.fps"))
        .stdout(predicate::str::contains("[error] camera.jpeg_quality"))
        .stderr(predicate::str::contains("error: config validation found errors"));
}

#[test]
fn config_check_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "log:\n  capacity: 0\n");
    let output = cctv(&dir)
        .args(["--json", "config", "check"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let warnings = json["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w["level"] == "error" && w["message"].as_str().unwrap().contains("log.capacity")));
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "server: [not, a, map]\n");
    cctv(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

// ---------------------------------------------------------------------------
// cctv cameras
// ---------------------------------------------------------------------------

#[test]
fn cameras_lists_test_pattern_devices() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "camera:\n  test_pattern_devices: [0, 2]\n");
    let output = cctv(&dir)
        .args(["--json", "cameras", "--backend", "test-pattern"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["backend"], "test-pattern");
    assert_eq!(json["cameras"], serde_json::json!([0, 2]));
}

#[test]
fn cameras_table_output() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["cameras", "--backend", "test-pattern"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INDEX"))
        .stdout(predicate::str::contains("test-pattern"));
}

#[test]
fn cameras_respects_scan_limit() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "camera:\n  scan_limit: 2\n  test_pattern_devices: [1, 3]\n",
    );
    let output = cctv(&dir)
        .args(["--json", "cameras", "--backend", "test-pattern"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["cameras"], serde_json::json!([1]));
}

#[test]
fn cameras_rejects_unknown_backend() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["cameras", "--backend", "gopro"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown camera backend 'gopro'"));
}

// ---------------------------------------------------------------------------
// cctv log
// ---------------------------------------------------------------------------

#[test]
fn log_reports_empty_log() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("No detections logged"));
}

#[test]
fn log_prints_recent_records() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, &["person", "dog", "car"]);
    cctv(&dir)
        .args(["log", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CONFIDENCE"))
        .stdout(predicate::str::contains("dog"))
        .stdout(predicate::str::contains("car"))
        .stdout(predicate::str::contains("87.5%"))
        .stdout(predicate::str::contains("person").not());
}

#[test]
fn log_json_output() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, &["person", "dog"]);
    let output = cctv(&dir).args(["--json", "log"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["class"], "person");
    assert_eq!(records[1]["camera_idx"], 0);
}

// ---------------------------------------------------------------------------
// cctv serve
// ---------------------------------------------------------------------------

#[test]
fn serve_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "camera:\n  fps: 0\n");
    cctv(&dir)
        .args(["serve", "--backend", "test-pattern", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn serve_rejects_unknown_backend() {
    let dir = TempDir::new().unwrap();
    cctv(&dir)
        .args(["serve", "--backend", "gopro"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown camera backend"));
}
