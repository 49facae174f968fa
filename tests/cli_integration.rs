//! CLI integration tests for rma
//!
//! These tests drive the binary end to end against a temporary project:
//! check-in, checklist work, status moves and slot handling.

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SN: &str = "1234567890123";

/// Get a command instance for the rma binary
fn rma_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("rma"))
}

/// Create a temporary directory and initialize an rma project
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    rma_cmd().arg("init").arg(dir.path()).assert().success();
    dir
}

/// Runs `rma <args>` inside the project and expects success
fn rma_ok(dir: &TempDir, args: &[&str]) -> String {
    let out = rma_cmd()
        .current_dir(dir.path())
        .args(["--format", "text"])
        .args(args)
        .assert()
        .success();
    String::from_utf8(out.get_output().stdout.clone()).unwrap()
}

/// Runs `rma --format json <args>` inside the project and parses stdout
fn rma_json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let out = rma_cmd()
        .current_dir(dir.path())
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success();
    serde_json::from_slice(&out.get_output().stdout).unwrap()
}

/// A project with a PSU category, a one-task intake status and a Repair status
fn setup_workflow() -> TempDir {
    let dir = setup_project();
    rma_ok(&dir, &["category", "add", "PSU"]);
    rma_ok(&dir, &["status", "add", "RMA Sorting"]);
    rma_ok(&dir, &["status", "add", "Repair", "--from", "RMA Sorting"]);
    rma_ok(&dir, &["task", "add", "Inspect"]);
    rma_ok(
        &dir,
        &["task", "map", "RMA Sorting", "1", "--predefined", "--order", "1"],
    );
    dir
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    rma_cmd()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized RMA tracker"));

    assert!(dir.path().join(".rma").is_dir());
    assert!(dir.path().join(".rma/config.toml").is_file());
    assert!(dir.path().join(".rma/rma.db").is_file());

    let config = fs::read_to_string(dir.path().join(".rma/config.toml")).unwrap();
    assert!(config.contains("initial_status = \"RMA Sorting\""));
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    rma_cmd().arg("init").arg(dir.path()).assert().success();
    rma_cmd().arg("init").arg(dir.path()).assert().success();
}

#[test]
fn test_commands_outside_project_fail() {
    let dir = TempDir::new().unwrap();

    rma_cmd()
        .current_dir(dir.path())
        .args(["unit", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in an rma project"));
}

// =============================================================================
// Unit Lifecycle Tests
// =============================================================================

#[test]
fn test_unit_add_and_show() {
    let dir = setup_workflow();

    let out = rma_ok(
        &dir,
        &["unit", "add", SN, "--category", "PSU", "--priority", "hot"],
    );
    assert!(out.contains("Checked in 1234567890123 (RMA Sorting)"));

    let unit = rma_json(&dir, &["unit", "show", SN]);
    assert_eq!(unit["serial"], SN);
    assert_eq!(unit["status"], "RMA Sorting");
    assert_eq!(unit["priority"], "hot");
    assert_eq!(unit["short_test"], "P");
}

#[test]
fn test_invalid_serial_exits_with_validation_code() {
    let dir = setup_workflow();

    rma_cmd()
        .current_dir(dir.path())
        .args(["unit", "add", "12345", "--category", "PSU"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("13 digits"));
}

#[test]
fn test_duplicate_serial_exits_with_conflict_code() {
    let dir = setup_workflow();
    rma_ok(&dir, &["unit", "add", SN, "--category", "PSU"]);

    rma_cmd()
        .current_dir(dir.path())
        .args(["unit", "add", SN, "--category", "PSU"])
        .assert()
        .code(3);
}

#[test]
fn test_outstanding_tasks_block_move() {
    let dir = setup_workflow();
    rma_ok(&dir, &["unit", "add", SN, "--category", "PSU"]);

    rma_cmd()
        .current_dir(dir.path())
        .args(["unit", "move", SN, "Repair"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("outstanding tasks"))
        .stderr(predicate::str::contains("Inspect"));

    let checklist = rma_json(&dir, &["unit", "checklist", SN, "--active"]);
    let entry_id = checklist[0]["id"].as_i64().unwrap().to_string();

    rma_ok(&dir, &["entry", "done", &entry_id, "--result", "no damage"]);

    let out = rma_ok(&dir, &["unit", "move", SN, "Repair"]);
    assert!(out.contains("is now in 'Repair'"));

    let history = rma_ok(&dir, &["unit", "history", SN]);
    assert!(history.contains("RMA Sorting: Inspect - is completed - Result: (Completed) no damage |"));
    assert!(history.contains("Repair:"));
}

#[test]
fn test_unknown_unit_exits_with_not_found_code() {
    let dir = setup_workflow();

    rma_cmd()
        .current_dir(dir.path())
        .args(["unit", "show", "9999999999999"])
        .assert()
        .code(5);
}

#[test]
fn test_unit_import_reports_per_item() {
    let dir = setup_workflow();
    let file = dir.path().join("units.json");
    fs::write(
        &file,
        r#"[
            {"serial": "1000000000001", "category": "PSU"},
            {"serial": "nope", "category": "PSU"},
            {"serial": "1000000000002", "category": "PSU", "priority": "zfa"}
        ]"#,
    )
    .unwrap();

    let report = rma_json(&dir, &["unit", "import", file.to_str().unwrap()]);
    assert_eq!(report["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(report["failed"][0]["serial"], "nope");
    assert_eq!(report["failed"][0]["kind"], "validation");
}

// =============================================================================
// Location Tests
// =============================================================================

#[test]
fn test_slot_assignment_and_occupancy() {
    let dir = setup_workflow();
    rma_ok(&dir, &["location", "provision", "A", "2", "2"]);
    rma_ok(&dir, &["unit", "add", SN, "--category", "PSU", "--slot", "A:1:1"]);
    rma_ok(&dir, &["unit", "add", "1234567890124", "--category", "PSU"]);

    rma_cmd()
        .current_dir(dir.path())
        .args(["location", "assign", "1234567890124", "A:1:1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("occupied"));

    let out = rma_ok(&dir, &["unit", "where", SN]);
    assert!(out.contains("A - Layer 1 - Space 1"));

    rma_cmd()
        .current_dir(dir.path())
        .args(["location", "remove-layer", "A", "1"])
        .assert()
        .code(4);

    rma_ok(&dir, &["location", "relocate", SN, "A:2:1"]);
    rma_ok(&dir, &["location", "remove-layer", "A", "1"]);

    let empty = rma_json(&dir, &["location", "empty", "A", "2"]);
    assert_eq!(empty.as_array().unwrap().len(), 1);
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[test]
fn test_status_tasks_listing() {
    let dir = setup_workflow();
    rma_ok(&dir, &["task", "add", "Photograph"]);
    rma_ok(&dir, &["task", "place", "RMA Sorting", "2", "1"]);

    let mappings = rma_json(&dir, &["status", "tasks", "RMA Sorting", "--predefined"]);
    let names: Vec<_> = mappings
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["task_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Photograph", "Inspect"]);
}

#[test]
fn test_closed_status_rejects_links() {
    let dir = setup_workflow();
    rma_ok(&dir, &["status", "add", "Scrapped", "--closed"]);

    rma_cmd()
        .current_dir(dir.path())
        .args(["status", "link", "Scrapped", "Repair"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("closed status"));
}
