// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_source_tracer::{
    config::Thresholds,
    transaction::{SqlOperation, TransactionFlow, TransactionPattern, summarize, time_diff_ms, visualize}
};

const PAGE_VIEW_LOG: &str = "\
2025-10-07T07:00:00.500000Z 1791542 Query BEGIN
2025-10-07T07:00:00.510000Z 1791542 Query INSERT INTO `page_views` (`member_id`, `company_id`, `action`) VALUES (48213, 4810, 'show')
2025-10-07T07:00:00.520000Z 1791542 Query INSERT INTO `audit_logs` (`member_id`, `event`) VALUES (48213, 'page_view')
2025-10-07T07:00:00.700000Z 1791542 Query SELECT `aggregated_content_views`.* FROM `aggregated_content_views` WHERE `member_id` = 48213 LIMIT 1
2025-10-07T07:00:00.710000Z 1791542 Query UPDATE `aggregated_content_views` SET `views` = 12 WHERE `member_id` = 48213
2025-10-07T07:00:00.800000Z 1791542 Query INSERT INTO `audit_logs` (`member_id`, `event`) VALUES (48213, 'aggregate')
2025-10-07T07:00:00.810000Z 1791542 Query INSERT INTO `audit_logs` (`member_id`, `event`) VALUES (48213, 'notify')
2025-10-07T07:00:00.900000Z 1791542 Query COMMIT";

fn kinds(flow: &TransactionFlow) -> Vec<&'static str> {
    flow.patterns.iter().map(|p| p.kind()).collect()
}

#[test]
fn test_page_view_transaction() {
    let flow = TransactionFlow::analyze(PAGE_VIEW_LOG, &Thresholds::default());
    assert_eq!(flow.queries.len(), 8);
    assert_eq!(
        flow.tables(),
        vec!["page_views", "audit_logs", "aggregated_content_views"]
    );
    let ops = flow.operation_types();
    assert!(ops.contains(&SqlOperation::Commit));
    assert!(ops.contains(&SqlOperation::Insert));
    assert_eq!(flow.started_at(), Some("2025-10-07T07:00:00.500000Z"));

    let kinds = kinds(&flow);
    assert!(kinds.contains(&"cascade_insert"));
    assert!(kinds.contains(&"read_modify_write"));
    assert!(kinds.contains(&"bulk_operation"));
    assert!(kinds.contains(&"data_flow"));
    assert!(!kinds.contains(&"controller_context"));

    let bulk = flow
        .patterns
        .iter()
        .find_map(|p| match p {
            TransactionPattern::BulkOperation {
                table,
                count,
                ..
            } => Some((table.as_str(), *count)),
            _ => None
        });
    assert_eq!(bulk, Some(("audit_logs", 3)));
}

#[test]
fn test_member_id_flows_from_first_insert() {
    let flow = TransactionFlow::analyze(PAGE_VIEW_LOG, &Thresholds::default());
    assert_eq!(flow.data_flow["page_views"], vec!["48213"]);
    assert!(flow.data_flow["audit_logs"].is_empty());
    assert!(
        flow.queries[2]
            .references
            .contains(&String::from("page_views#48213"))
    );
    assert_eq!(
        flow.trigger_chain.first(),
        Some(&(String::from("page_views#1"), String::from("audit_logs#2")))
    );
}

#[test]
fn test_close_inserts_cascade() {
    let log = "\
2025-10-07T07:00:00.500000Z 3 Query INSERT INTO orders (member_id) VALUES (90210)
2025-10-07T07:00:00.510000Z 3 Query INSERT INTO order_events (kind) VALUES ('created')";
    let flow = TransactionFlow::analyze(log, &Thresholds::default());
    let cascade = flow
        .patterns
        .iter()
        .find(|p| p.kind() == "cascade_insert")
        .unwrap();
    assert_eq!(
        cascade.description(),
        "INSERT into orders triggers INSERT into order_events"
    );
    assert!(cascade.likely_cause().unwrap().contains("callback"));
    assert_eq!(
        flow.trigger_chain,
        vec![(String::from("orders#0"), String::from("order_events#1"))]
    );
}

#[test]
fn test_distant_inserts_do_not_cascade() {
    let log = "\
2025-10-07T07:00:00.500000Z 3 Query INSERT INTO orders (member_id) VALUES (90210)
2025-10-07T07:00:00.650000Z 3 Query INSERT INTO order_events (kind) VALUES ('created')";
    let flow = TransactionFlow::analyze(log, &Thresholds::default());
    assert!(!kinds(&flow).contains(&"cascade_insert"));
    assert!(flow.trigger_chain.is_empty());

    let wide = Thresholds {
        cascade_window_ms: 200,
        ..Thresholds::default()
    };
    let flow = TransactionFlow::analyze(log, &wide);
    assert!(kinds(&flow).contains(&"cascade_insert"));
}

#[test]
fn test_untimed_statements_are_simultaneous() {
    assert_eq!(time_diff_ms(None, Some("2025-10-07T07:00:00.500000Z")), 0);
    assert_eq!(
        time_diff_ms(
            Some("2025-10-07T07:00:01.000000Z"),
            Some("2025-10-07T07:00:00.250000Z")
        ),
        750
    );

    let flow = TransactionFlow::analyze(
        "BEGIN;\nINSERT INTO orders (member_id) VALUES (90210);\nINSERT INTO order_events (order_ref) VALUES (90210);\nCOMMIT;",
        &Thresholds::default()
    );
    assert_eq!(flow.queries.len(), 4);
    assert!(kinds(&flow).contains(&"cascade_insert"));
    assert!(visualize(&flow).timeline.iter().all(|s| s.timestamp.is_none()));
}

#[test]
fn test_controller_context_stays_inferred() {
    let log = "\
2025-10-07T07:00:00.500000Z 9 Query INSERT INTO page_views (member_id) VALUES (48213) /*application:Web,controller:admin/work_pages,action:show*/
2025-10-07T07:00:00.600000Z 9 Query UPDATE members SET views = 3 WHERE id = 48213 /*application:Web,controller:admin/work_pages,action:show*/";
    let flow = TransactionFlow::analyze(log, &Thresholds::default());
    let contexts: Vec<&TransactionPattern> = flow.controller_contexts().collect();
    assert_eq!(contexts.len(), 1);
    let TransactionPattern::ControllerContext {
        controller,
        action,
        inferred_context,
        status,
        ..
    } = contexts[0]
    else {
        panic!("expected controller context");
    };
    assert_eq!(controller, "admin/work_pages");
    assert_eq!(action, "show");
    assert_eq!(inferred_context, "Admin::WorkPagesController#show");
    assert_eq!(*status, "inferred, unverified");
    assert!(contexts[0].likely_cause().is_none());

    let summary = summarize(&flow, &[]);
    assert!(summary.contains("SQL comments suggest: Admin::WorkPagesController#show"));
}

#[test]
fn test_summary_lists_patterns_and_chain() {
    let flow = TransactionFlow::analyze(PAGE_VIEW_LOG, &Thresholds::default());
    let summary = summarize(&flow, &[]);
    assert!(summary.starts_with("=== SQL Transaction Analysis ==="));
    assert!(summary.contains("Total queries: 8"));
    assert!(summary.contains("=== Transaction Patterns Detected ==="));
    assert!(summary.contains("=== Callback/Trigger Chain ==="));
    assert!(summary.contains("- page_views#1 -> audit_logs#2"));
    assert!(!summary.contains("=== Source Code Locations ==="));
}

#[test]
fn test_visualization_carries_references() {
    let flow = TransactionFlow::analyze(PAGE_VIEW_LOG, &Thresholds::default());
    let viz = visualize(&flow);
    assert_eq!(viz.timeline.len(), 8);
    assert_eq!(viz.timeline[0].operation, "BEGIN N/A");
    assert_eq!(viz.timeline[1].step, 2);
    assert!(viz.timeline[1].timestamp.is_some());
    assert!(!viz.timeline[2].references.is_empty());
    assert_eq!(viz.trigger_graph[0].from, "page_views#1");
}
