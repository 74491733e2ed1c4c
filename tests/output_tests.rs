// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_source_tracer::{
    config::Config,
    error::ToolError,
    normalizer::classify,
    output::{
        OutputFormat, OutputOptions, format_classification, format_query_analysis,
        format_search_report, format_tool_error, format_transaction_report
    },
    progressive::{MatchType, RankedMatch},
    query::{analyze, fingerprint, verification_command},
    tools::{AnalysisSummary, SearchReport, SourceTracer, TransactionInput}
};

fn plain() -> OutputOptions {
    OutputOptions {
        format:  OutputFormat::Text,
        colored: false,
        verbose: false
    }
}

fn with_format(format: OutputFormat) -> OutputOptions {
    OutputOptions {
        format,
        ..plain()
    }
}

fn report() -> SearchReport {
    let analysis = analyze("SELECT COUNT(*) FROM members WHERE company_id = 42");
    SearchReport {
        fingerprint:          fingerprint(&analysis),
        matches:              vec![RankedMatch {
            file:         String::from("app/models/member.rb"),
            line:         12,
            snippet:      String::from("Member.where(company_id: company.id).count"),
            confidence:   0.7,
            why:          vec![String::from("Matched 1 pattern(s): model")],
            match_type:   MatchType::Definition,
            rule:         Some("SCOPE_DEFINITION"),
            completeness: None,
            priority:     1
        }],
        query_analysis:       AnalysisSummary::from(&analysis),
        verification_command: verification_command(&analysis)
    }
}

#[test]
fn test_search_report_text() {
    let out = format_search_report(&report(), &plain());
    assert!(out.contains("Fingerprint: SELECT COUNT(*) FROM members WHERE company_id = ?"));
    assert!(out.contains("#1 app/models/member.rb:12 [0.70] definition"));
    assert!(out.contains("    - Matched 1 pattern(s): model"));
    assert!(out.contains("Verify with: rails runner"));
}

#[test]
fn test_search_report_without_matches() {
    let mut report = report();
    report.matches.clear();
    assert!(format_search_report(&report, &plain()).contains("No matches found"));
}

#[test]
fn test_search_report_json() {
    let out = format_search_report(&report(), &with_format(OutputFormat::Json));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["matches"][0]["match_type"], "definition");
    assert_eq!(json["matches"][0]["rule"], "SCOPE_DEFINITION");
    assert!(json["matches"][0].get("priority").is_none());
    assert_eq!(json["query_analysis"]["intent"], "count_aggregate");
}

#[test]
fn test_search_report_yaml() {
    let out = format_search_report(&report(), &with_format(OutputFormat::Yaml));
    assert!(out.contains("fingerprint:"));
    assert!(out.contains("file: app/models/member.rb"));
}

#[test]
fn test_classification_text() {
    let out = format_classification(&classify("SELECT 1 FROM users"), &plain());
    assert!(out.starts_with("Input: single (1 query, high confidence)"));
    assert!(out.contains("Reason: Single SQL statement detected"));
}

#[test]
fn test_query_analysis_text() {
    let analysis = analyze("SELECT * FROM members WHERE company_id = 1 ORDER BY name LIMIT 10 OFFSET 20");
    let out = format_query_analysis(&analysis, &plain());
    assert!(out.contains("Tables: members (Member)"));
    assert!(out.contains("WHERE: company_id ="));
    assert!(out.contains("ORDER BY: name"));
    assert!(out.contains("LIMIT: 10"));
    assert!(out.contains("OFFSET: 20"));
    assert!(!out.contains("Complexity"));

    let verbose = OutputOptions {
        verbose: true,
        ..plain()
    };
    assert!(format_query_analysis(&analysis, &verbose).contains("Complexity"));
}

#[test]
fn test_tool_error_text() {
    let error = ToolError::new("Transaction log detected. Use transaction_analyzer tool instead.")
        .with_suggestion("Use transaction_analyzer")
        .with_classification(3, "Multiple SQL statements detected (3 queries)");
    let out = format_tool_error(&error, &plain());
    assert!(out.starts_with("error: Transaction log detected."));
    assert!(out.contains("  reason: Multiple SQL statements detected (3 queries)"));
    assert!(out.contains("  suggestion: Use transaction_analyzer"));
}

#[tokio::test]
async fn test_transaction_report_timeline_in_verbose_mode() {
    let mut tracer = SourceTracer::new(&Config::default());
    let report = tracer
        .analyze_transaction(&TransactionInput::new(
            "BEGIN;\nINSERT INTO page_views (member_id) VALUES (48213);\nCOMMIT;"
        ))
        .await
        .unwrap();

    let out = format_transaction_report(&report, &plain());
    assert!(out.starts_with("=== SQL Transaction Analysis ==="));
    assert!(!out.contains("=== Timeline ==="));

    let verbose = OutputOptions {
        verbose: true,
        ..plain()
    };
    let out = format_transaction_report(&report, &verbose);
    assert!(out.contains("=== Timeline ==="));
    assert!(out.contains("  2. INSERT page_views"));
}
