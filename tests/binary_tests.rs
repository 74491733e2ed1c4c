//! Integration tests for the sql-source-tracer binary.

use std::{fs, io::Write};

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::NamedTempFile;

const TRANSACTION_LOG: &str = "\
2025-10-07T07:00:00.500000Z 7 Query BEGIN
2025-10-07T07:00:00.510000Z 7 Query INSERT INTO page_views (member_id) VALUES (48213)
2025-10-07T07:00:00.515000Z 7 Query INSERT INTO audit_logs (member_id) VALUES (48213)
2025-10-07T07:00:00.600000Z 7 Query COMMIT";

fn cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("sql-source-tracer");
    cmd.env_remove("SQL_TRACER_PROJECT_ROOT")
        .env_remove("SQL_TRACER_BACKEND")
        .env_remove("SQL_TRACER_LOG");
    cmd
}

fn rails_app() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let controllers = dir.path().join("app/controllers");
    fs::create_dir_all(&controllers).unwrap();
    fs::write(
        controllers.join("members_controller.rb"),
        "class MembersController < ApplicationController\n  def index\n    @members = Member.where(company_id: current_company.id).limit(10)\n  end\nend\n"
    )
    .unwrap();
    dir
}

#[test]
fn test_classify_stdin() {
    cmd()
        .args(["classify", "--input", "-", "--no-color"])
        .write_stdin("SELECT * FROM members WHERE id = 1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Input: single"));
}

#[test]
fn test_classify_transaction_file_json() {
    let mut log = NamedTempFile::new().unwrap();
    writeln!(log, "{}", TRANSACTION_LOG).unwrap();

    cmd()
        .args(["classify", "-i", log.path().to_str().unwrap(), "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"input_type\": \"transaction\""));
}

#[test]
fn test_analyze_inline_sql() {
    cmd()
        .args([
            "analyze",
            "--sql",
            "SELECT COUNT(*) FROM members WHERE company_id = 42",
            "--no-color"
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Intent: count_aggregate"))
        .stdout(predicate::str::contains("Tables: members (Member)"));
}

#[test]
fn test_analyze_requires_input() {
    cmd().args(["analyze"]).assert().code(1);
}

#[test]
fn test_analyze_empty_sql_is_tool_error() {
    cmd()
        .args(["analyze", "--sql", "   ", "--no-color"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("error: Empty SQL query"));
}

#[test]
fn test_search_missing_input_file() {
    cmd()
        .args(["search", "--input", "/nonexistent/query.sql"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_search_missing_root() {
    cmd()
        .args(["search", "--root", "/nonexistent/rails/app", "--sql", "SELECT 1"])
        .assert()
        .code(1);
}

#[test]
fn test_search_without_root_is_tool_error() {
    cmd()
        .args(["search", "--sql", "SELECT * FROM members LIMIT 10", "--no-color"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Project root not found"));
}

#[test]
fn test_search_redirects_transaction_log() {
    let app = rails_app();
    cmd()
        .args([
            "search",
            "--root",
            app.path().to_str().unwrap(),
            "--backend",
            "walk",
            "--input",
            "-",
            "-f",
            "json"
        ])
        .write_stdin(TRANSACTION_LOG)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("transaction_analyzer"));
}

#[test]
fn test_search_json() {
    let app = rails_app();
    let output = cmd()
        .args([
            "search",
            "--root",
            app.path().to_str().unwrap(),
            "--backend",
            "walk",
            "--sql",
            "SELECT * FROM members WHERE company_id = 42 LIMIT 10",
            "-f",
            "json"
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json["matches"][0]["file"],
        "app/controllers/members_controller.rb"
    );
    assert_eq!(json["matches"][0]["line"], 3);
}

#[test]
fn test_transaction_without_source() {
    let mut log = NamedTempFile::new().unwrap();
    writeln!(log, "{}", TRANSACTION_LOG).unwrap();

    cmd()
        .args([
            "transaction",
            "--input",
            log.path().to_str().unwrap(),
            "--no-source",
            "--no-color",
            "--verbose"
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total queries: 4"))
        .stdout(predicate::str::contains("cascade_insert"))
        .stdout(predicate::str::contains("=== Timeline ==="));
}

#[test]
fn test_transaction_empty_log() {
    cmd()
        .args(["transaction", "--input", "-"])
        .write_stdin("\n")
        .assert()
        .code(2);
}

#[test]
fn test_invalid_format() {
    cmd()
        .args(["classify", "--input", "-", "-f", "xml"])
        .assert()
        .failure();
}
