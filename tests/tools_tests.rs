// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::{fs, path::Path};

use sql_source_tracer::{
    config::{BackendKind, Config, SearchConfig},
    progressive::MatchType,
    tools::{SearchInput, SourceTracer, TransactionInput},
    transaction::{SearchStrategy, SqlOperation, TransactionPattern}
};
use tempfile::TempDir;

const TRANSACTION_LOG: &str = "\
2025-10-07T07:00:00.500000Z 7 Query BEGIN
2025-10-07T07:00:00.510000Z 7 Query INSERT INTO page_views (member_id, company_id, action, controller) VALUES (48213, 4810, 'show', 'members') /*controller:members,action:show*/
2025-10-07T07:00:00.515000Z 7 Query INSERT INTO audit_logs (member_id, action) VALUES (48213, 'show')
2025-10-07T07:00:00.600000Z 7 Query COMMIT";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn rails_app() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app/controllers/members_controller.rb",
        "class MembersController < ApplicationController\n  def index\n    @members = Member.where(company_id: current_company.id).limit(10)\n  end\n\n  def show\n    PageViewRecorder.new.record(current_member, 'show')\n  end\nend\n"
    );
    write(
        root,
        "app/views/members/index.html.erb",
        "<h1>Members</h1>\n<% @members.each do |member| %>\n  <%= member.name %>\n<% end %>\n<p><%= @members.size %></p>\n"
    );
    write(
        root,
        "app/models/page_view.rb",
        "class PageView < ApplicationRecord\n  belongs_to :member\n  after_create :write_audit_log\n  after_commit :refresh_stats\nend\n"
    );
    write(
        root,
        "app/services/page_view_recorder.rb",
        "class PageViewRecorder\n  def record(member, action)\n    ActiveRecord::Base.transaction do\n      PageView.create!(member_id: member.id, company_id: member.company_id, action: action)\n    end\n  end\nend\n"
    );
    write(
        root,
        "spec/controllers/members_controller_spec.rb",
        "Member.where(company_id: 1).limit(10)\n"
    );
    dir
}

fn config(root: Option<&Path>) -> Config {
    Config {
        project_root: root.map(Path::to_path_buf),
        search:       SearchConfig {
            backend: BackendKind::Walk,
            ..SearchConfig::default()
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn test_search_sql_finds_controller_relation() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    assert!(tracer.has_project());

    let report = tracer
        .search_sql(
            &SearchInput::new("SELECT * FROM members WHERE company_id = 42 LIMIT 10")
                .without_usage_sites()
        )
        .await
        .unwrap();
    assert_eq!(
        report.fingerprint,
        "SELECT * FROM members WHERE company_id = ? LIMIT ?"
    );
    assert_eq!(report.query_analysis.models, vec!["Member"]);

    let top = &report.matches[0];
    assert_eq!(top.file, "app/controllers/members_controller.rb");
    assert_eq!(top.line, 3);
    assert!(top.confidence >= 0.8);
    assert!(report.matches.iter().all(|m| !m.file.starts_with("spec/")));
    assert!(report.matches.iter().all(|m| m.match_type == MatchType::Definition));
}

#[tokio::test]
async fn test_search_sql_strips_log_prefix() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let report = tracer
        .search_sql(&SearchInput::new(
            "  Member Load (0.8ms)  SELECT `members`.* FROM `members` WHERE `members`.`company_id` = 42 LIMIT 10"
        ))
        .await
        .unwrap();
    assert!(report.fingerprint.starts_with("SELECT"));
    assert_eq!(report.matches[0].line, 3);
}

#[tokio::test]
async fn test_usage_sites_follow_instance_variable() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let input = SearchInput {
        sql:                 String::from("SELECT * FROM members WHERE company_id = 42 LIMIT 10"),
        max_results:         Some(10),
        include_usage_sites: true
    };
    let report = tracer.search_sql(&input).await.unwrap();

    let usages: Vec<_> = report
        .matches
        .iter()
        .filter(|m| m.match_type == MatchType::Usage)
        .collect();
    assert_eq!(usages.len(), 2);
    assert!(usages.iter().all(|m| m.file == "app/views/members/index.html.erb"));

    let each = usages.iter().find(|m| m.line == 2).unwrap();
    assert_eq!(each.confidence, 0.5);
    let size = usages.iter().find(|m| m.line == 5).unwrap();
    assert_eq!(size.confidence, 0.3);

    // definitions rank above usages
    assert_eq!(report.matches[0].match_type, MatchType::Definition);
}

#[tokio::test]
async fn test_usage_sites_are_on_by_default() {
    let input: SearchInput = serde_json::from_str(
        r#"{"sql": "SELECT * FROM members WHERE company_id = 42 LIMIT 10"}"#
    )
    .unwrap();
    assert!(input.include_usage_sites);
    assert_eq!(input.max_results, None);

    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let report = tracer.search_sql(&input).await.unwrap();
    assert!(report.matches.iter().any(|m| m.match_type == MatchType::Usage));

    let input: SearchInput =
        serde_json::from_str(r#"{"sql": "SELECT 1", "include_usage_sites": false}"#).unwrap();
    assert!(!input.include_usage_sites);
}

#[tokio::test]
async fn test_transaction_log_is_redirected() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let err = tracer
        .search_sql(&SearchInput::new(TRANSACTION_LOG))
        .await
        .unwrap_err();
    assert_eq!(
        err.error,
        "Transaction log detected. Use transaction_analyzer tool instead."
    );
    assert!(err.suggestion.as_deref().is_some_and(|s| s.contains("transaction_analyzer")));
    assert!(err.detected_queries.is_some());
    assert!(err.classification_reason.is_some());
}

#[tokio::test]
async fn test_empty_sql() {
    let mut tracer = SourceTracer::new(&config(None));
    let err = tracer.search_sql(&SearchInput::new("   ")).await.unwrap_err();
    assert_eq!(err.error, "Empty SQL query");
}

#[tokio::test]
async fn test_search_without_project_root() {
    let mut tracer = SourceTracer::new(&config(None));
    assert!(!tracer.has_project());
    let err = tracer
        .search_sql(&SearchInput::new("SELECT * FROM members LIMIT 10"))
        .await
        .unwrap_err();
    assert_eq!(err.error, "Project root not found");

    let mut tracer = SourceTracer::new(&config(Some(Path::new("/nonexistent/app"))));
    assert!(!tracer.has_project());
    let err = tracer
        .search_sql(&SearchInput::new("SELECT * FROM members LIMIT 10"))
        .await
        .unwrap_err();
    assert_eq!(err.error, "Project root not found");
}

#[tokio::test]
async fn test_empty_transaction_log() {
    let mut tracer = SourceTracer::new(&config(None));
    let err = tracer
        .analyze_transaction(&TransactionInput::new("\n  \n"))
        .await
        .unwrap_err();
    assert_eq!(err.error, "Empty transaction log");
}

#[tokio::test]
async fn test_transaction_without_project_still_analyzes_flow() {
    let mut tracer = SourceTracer::new(&config(None));
    let report = tracer
        .analyze_transaction(&TransactionInput::new(TRANSACTION_LOG))
        .await
        .unwrap();
    assert_eq!(report.query_count, 4);
    assert_eq!(report.tables_affected, vec!["page_views", "audit_logs"]);
    assert_eq!(
        report.operation_types,
        vec![SqlOperation::Begin, SqlOperation::Insert, SqlOperation::Commit]
    );
    assert!(report.source_code_findings.is_empty());
    assert!(report.transaction_summary.contains("=== SQL Transaction Analysis ==="));
    assert!(report.transaction_summary.contains("Inferred Context (not verified)"));
    assert_eq!(
        report.trigger_chains,
        vec![(String::from("page_views#1"), String::from("audit_logs#2"))]
    );
}

#[tokio::test]
async fn test_transaction_source_findings_in_strategy_order() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let report = tracer
        .analyze_transaction(&TransactionInput::new(TRANSACTION_LOG))
        .await
        .unwrap();

    let strategies: Vec<SearchStrategy> = report
        .source_code_findings
        .iter()
        .map(|f| f.strategy)
        .collect();
    assert_eq!(
        &strategies[..3],
        &[
            SearchStrategy::ControllerContextVerification,
            SearchStrategy::TransactionWrapper,
            SearchStrategy::CallbackDeclaration
        ]
    );

    let verified = &report.source_code_findings[0];
    assert_eq!(verified.query, "CONTROLLER ACTION: members#show");
    assert_eq!(verified.matches[0].file, "app/controllers/members_controller.rb");
    assert_eq!(verified.matches[0].line, 6);
    assert_eq!(verified.matches[0].confidence, "verified");

    let wrapper = &report.source_code_findings[1];
    assert_eq!(wrapper.matches[0].file, "app/services/page_view_recorder.rb");
    assert_eq!(wrapper.matches[0].line, 3);
    assert_eq!(wrapper.matches[0].confidence, "high (3/4 columns)");
    assert_eq!(wrapper.matched_columns, vec!["member_id", "company_id", "action"]);

    let callbacks = &report.source_code_findings[2];
    assert_eq!(callbacks.query, "CALLBACKS on PageView");
    assert_eq!(callbacks.matches.len(), 2);

    // the inferred record is never upgraded by verification
    let context = report
        .transaction_patterns
        .iter()
        .find(|p| p.kind() == "controller_context")
        .unwrap();
    let TransactionPattern::ControllerContext {
        status,
        inferred_context,
        ..
    } = context
    else {
        panic!("expected controller context");
    };
    assert_eq!(*status, "inferred, unverified");
    assert_eq!(inferred_context, "MembersController#show");
    assert!(!report.transaction_summary.contains("Inferred Context (not verified)"));
}

#[tokio::test]
async fn test_transaction_without_source_search() {
    let app = rails_app();
    let mut tracer = SourceTracer::new(&config(Some(app.path())));
    let report = tracer
        .analyze_transaction(&TransactionInput::new(TRANSACTION_LOG).without_source())
        .await
        .unwrap();
    assert!(report.source_code_findings.is_empty());
    assert_eq!(report.visualization.timeline.len(), 4);
    assert_eq!(report.visualization.timeline[1].operation, "INSERT page_views");
}
