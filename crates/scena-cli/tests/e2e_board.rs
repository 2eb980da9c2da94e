//! E2E tests for the read-only surface: `board`, `gantt`, `config`, and
//! error reporting.
//!
//! Each test runs `scena` as a subprocess against a snapshot file in an
//! isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the scena binary with a clean environment.
fn scena_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scena"));
    cmd.current_dir(dir);
    // Keep the user's own config out of the way
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    for var in ["SCENA_URL", "SCENA_PROJECT", "SCENA_TOKEN", "SCENA_POLL_MS", "FORMAT"] {
        cmd.env_remove(var);
    }
    // Suppress tracing output that goes to stderr
    cmd.env("SCENA_LOG", "error");
    cmd
}

/// Write the standard three-column board and return its path.
fn seed_board(dir: &Path) -> PathBuf {
    let path = dir.join("board.json");
    let board = serde_json::json!({
        "columns": [
            { "id": "c2", "name": "Edit", "order": 1 },
            { "id": "c1", "name": "Shoot", "order": 0 },
            { "id": "c3", "name": "Deliver", "order": 2 }
        ],
        "tasks": [
            { "id": "t1", "title": "Storyboard", "columnId": "c1", "order": 0 },
            { "id": "t2", "title": "Shot list", "columnId": "c1", "order": 1, "parentId": "t1" },
            { "id": "t3", "title": "Rough cut", "columnId": "c2", "order": 0,
              "startDate": "2026-03-02", "progress": 40 },
            { "id": "t4", "title": "Colour", "columnId": "c2", "order": 1, "parentId": "t3" },
            { "id": "t5", "title": "Internal notes", "columnId": "c2", "order": 2,
              "isHiddenInGantt": true }
        ]
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&board).expect("serialize")).expect("seed");
    path
}

fn run_json(dir: &Path, snapshot: &Path, args: &[&str]) -> Value {
    let output = scena_cmd(dir)
        .arg("--snapshot")
        .arg(snapshot)
        .args(args)
        .arg("--json")
        .output()
        .expect("scena should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn task_ids(column: &Value) -> Vec<String> {
    column["tasks"]
        .as_array()
        .expect("tasks array")
        .iter()
        .map(|t| t["id"].as_str().expect("id").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// board
// ---------------------------------------------------------------------------

#[test]
fn board_json_lists_columns_in_order_with_nested_tasks() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    let json = run_json(dir.path(), &snapshot, &["board"]);
    assert_eq!(json["project"], "local");

    let columns = json["columns"].as_array().expect("columns");
    let ids: Vec<&str> = columns.iter().map(|c| c["id"].as_str().expect("id")).collect();
    assert_eq!(ids, ["c1", "c2", "c3"]);

    assert_eq!(task_ids(&columns[0]), ["t1", "t2"]);
    assert_eq!(columns[0]["tasks"][1]["level"], 1);
    assert_eq!(columns[0]["tasks"][1]["sortKey"], "000000.000001");
    assert_eq!(task_ids(&columns[1]), ["t3", "t4", "t5"]);
    assert!(task_ids(&columns[2]).is_empty());
}

#[test]
fn board_text_is_tab_separated_rows() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    scena_cmd(dir.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["board", "--column", "c1", "--format", "text"])
        .assert()
        .success()
        .stdout("c1\tt1\t0\t000000\tStoryboard\nc1\tt2\t1\t000000.000001\tShot list\n");
}

#[test]
fn board_pretty_shows_empty_columns() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    scena_cmd(dir.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["board", "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deliver (0)"))
        .stdout(predicate::str::contains("(empty)"))
        .stdout(predicate::str::contains("    t2  Shot list"));
}

#[test]
fn board_reports_parent_cycles() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("board.json");
    let board = serde_json::json!({
        "columns": [{ "id": "c1", "name": "Shoot", "order": 0 }],
        "tasks": [
            { "id": "x", "title": "X", "columnId": "c1", "order": 0, "parentId": "y" },
            { "id": "y", "title": "Y", "columnId": "c1", "order": 1, "parentId": "x" }
        ]
    });
    std::fs::write(&path, board.to_string()).expect("seed");

    let json = run_json(dir.path(), &path, &["board"]);
    let rows = json["columns"][0]["tasks"].as_array().expect("tasks");
    assert_eq!(rows.len(), 2, "every task is shown exactly once");
    assert!(rows.iter().all(|r| r["level"] == 0));
    assert!(!json["cycles"].as_array().expect("cycles").is_empty());
}

#[test]
fn board_unknown_column_is_e2002() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    scena_cmd(dir.path())
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["board", "--column", "nope", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2002]"));
}

#[test]
fn missing_snapshot_file_is_an_empty_board() {
    let dir = TempDir::new().expect("tempdir");
    let json = run_json(dir.path(), &dir.path().join("fresh.json"), &["board"]);
    assert!(json["columns"].as_array().expect("columns").is_empty());
}

#[test]
fn corrupt_snapshot_is_e5001() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("board.json");
    std::fs::write(&path, "{ not json").expect("seed");

    let output = scena_cmd(dir.path())
        .arg("--snapshot")
        .arg(&path)
        .args(["board", "--json"])
        .output()
        .expect("scena should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert_eq!(json["error"]["error_code"], "E5001");
}

// ---------------------------------------------------------------------------
// gantt
// ---------------------------------------------------------------------------

#[test]
fn gantt_nests_across_columns_and_hides_flagged_tasks() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    let json = run_json(dir.path(), &snapshot, &["gantt"]);
    let rows = json.as_array().expect("rows");
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().expect("id")).collect();
    assert_eq!(rows.len(), 4);
    assert!(!ids.contains(&"t5"));

    let rough_cut = rows.iter().find(|r| r["id"] == "t3").expect("t3 row");
    assert_eq!(rough_cut["startDate"], "2026-03-02");
    assert_eq!(rough_cut["progress"], 40);

    let colour = rows.iter().find(|r| r["id"] == "t4").expect("t4 row");
    assert_eq!(colour["level"], 1);
}

#[test]
fn gantt_all_includes_hidden_tasks() {
    let dir = TempDir::new().expect("tempdir");
    let snapshot = seed_board(dir.path());

    let json = run_json(dir.path(), &snapshot, &["gantt", "--all"]);
    assert_eq!(json.as_array().expect("rows").len(), 5);
}

// ---------------------------------------------------------------------------
// config and setup errors
// ---------------------------------------------------------------------------

#[test]
fn config_layers_file_env_and_flags() {
    let dir = TempDir::new().expect("tempdir");
    let config_dir = dir.path().join("xdg/scena");
    std::fs::create_dir_all(&config_dir).expect("mkdir");
    std::fs::write(
        config_dir.join("config.toml"),
        "server_url = \"http://file.example/\"\nproject = \"from-file\"\ntoken = \"s3cret\"\n",
    )
    .expect("write config");

    let output = scena_cmd(dir.path())
        .env("SCENA_PROJECT", "from-env")
        .args(["config", "--server", "http://flag.example", "--json"])
        .output()
        .expect("scena should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");

    assert_eq!(json["server_url"], "http://flag.example");
    assert_eq!(json["project"], "from-env");
    assert_eq!(json["token"], "<set>");
    assert_eq!(json["poll_interval_ms"], 5000);
    assert!(!String::from_utf8_lossy(&output.stdout).contains("s3cret"));
}

#[test]
fn malformed_config_is_e1001() {
    let dir = TempDir::new().expect("tempdir");
    let config_dir = dir.path().join("xdg/scena");
    std::fs::create_dir_all(&config_dir).expect("mkdir");
    std::fs::write(config_dir.join("config.toml"), "poll_interval_ms = \"soon\"").expect("write");

    scena_cmd(dir.path())
        .args(["config", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"));
}

#[test]
fn server_without_project_is_e1002() {
    let dir = TempDir::new().expect("tempdir");
    scena_cmd(dir.path())
        .args(["board", "--server", "http://127.0.0.1:9", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1002]"));
}

#[test]
fn no_server_and_no_snapshot_explains_how_to_configure() {
    let dir = TempDir::new().expect("tempdir");
    scena_cmd(dir.path())
        .args(["board", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no server configured"));
}

#[test]
fn completions_are_generated() {
    let dir = TempDir::new().expect("tempdir");
    scena_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scena"));
}
