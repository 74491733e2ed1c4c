// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_source_tracer::error::{
    ToolError, config_error, file_read_error, project_root_error, query_parse_error,
    search_backend_error
};

#[test]
fn test_file_read_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error = file_read_error("/path/to/tx.log", io_error);
    let _msg = error.to_string();
}

#[test]
fn test_query_parse_error_with_position() {
    let error = query_parse_error("Expected: an expression, found: ? at Line: 1, Column 32");
    let _msg = error.to_string();
}

#[test]
fn test_config_error() {
    let error = config_error("Invalid config file");
    let _msg = error.to_string();
}

#[test]
fn test_project_root_error() {
    let error = project_root_error("/srv/missing");
    let _msg = error.to_string();
}

#[test]
fn test_search_backend_error() {
    let error = search_backend_error("rg timed out after 5s");
    let _msg = error.to_string();
}

#[test]
fn test_tool_error_skips_empty_fields() {
    let json = serde_json::to_value(ToolError::new("Empty SQL query")).unwrap();
    assert_eq!(json, serde_json::json!({ "error": "Empty SQL query" }));
}

#[test]
fn test_tool_error_with_classification() {
    let error = ToolError::new("Transaction log detected. Use transaction_analyzer tool instead.")
        .with_suggestion("Use the transaction_analyzer tool")
        .with_classification(3, "Multiple SQL statements detected (3 queries)");
    let json = serde_json::to_value(&error).unwrap();
    assert_eq!(json["detected_queries"], 3);
    assert_eq!(
        json["classification_reason"],
        "Multiple SQL statements detected (3 queries)"
    );
    assert_eq!(
        error.to_string(),
        "Transaction log detected. Use transaction_analyzer tool instead. (Use the transaction_analyzer tool)"
    );
}

#[test]
fn test_tool_error_display_without_suggestion() {
    assert_eq!(ToolError::new("Empty transaction log").to_string(), "Empty transaction log");
}
