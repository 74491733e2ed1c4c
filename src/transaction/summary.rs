//! Human-readable summary and timeline of a transaction.

use std::fmt::Write;

use serde::Serialize;

use super::{SearchStrategy, SourceFinding, TransactionFlow, TransactionPattern};

/// Findings listed per strategy in the summary
const FINDINGS_PER_STRATEGY: usize = 3;

/// One statement on the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineStep {
    /// 1-based
    pub step:       usize,
    /// `INSERT page_views`
    pub operation:  String,
    /// Only present when timestamps differ across the log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp:  Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerEdge {
    pub from: String,
    pub to:   String
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    pub timeline:      Vec<TimelineStep>,
    pub trigger_graph: Vec<TriggerEdge>
}

/// Timeline of statements plus the trigger graph
pub fn visualize(flow: &TransactionFlow) -> Visualization {
    let mut stamps = flow.queries.iter().filter_map(|q| q.timestamp.as_deref());
    let first = stamps.next();
    let varying = stamps.any(|ts| Some(ts) != first);

    let timeline = flow
        .queries
        .iter()
        .enumerate()
        .map(|(idx, q)| TimelineStep {
            step:       idx + 1,
            operation:  format!("{} {}", q.operation, q.table.as_deref().unwrap_or("N/A")),
            timestamp:  q.timestamp.clone().filter(|_| varying),
            references: q.references.clone()
        })
        .collect();

    let mut trigger_graph: Vec<TriggerEdge> = Vec::new();
    for (from, to) in &flow.trigger_chain {
        let edge = TriggerEdge {
            from: from.clone(),
            to:   to.clone()
        };
        if !trigger_graph.contains(&edge) {
            trigger_graph.push(edge);
        }
    }

    Visualization {
        timeline,
        trigger_graph
    }
}

/// Plain-text report of the flow and whatever source was found for it
pub fn summarize(flow: &TransactionFlow, findings: &[SourceFinding]) -> String {
    let mut out = String::new();
    let ops = flow
        .operation_counts()
        .iter()
        .map(|(op, count)| format!("{}: {}", op, count))
        .collect::<Vec<_>>()
        .join(", ");

    let _ = writeln!(out, "=== SQL Transaction Analysis ===\n");
    let _ = writeln!(out, "Total queries: {}", flow.queries.len());
    let _ = writeln!(out, "Tables affected: {}", flow.tables().join(", "));
    let _ = writeln!(out, "Operations: {}\n", ops);

    if !flow.patterns.is_empty() {
        let _ = writeln!(out, "=== Transaction Patterns Detected ===");
        for pattern in &flow.patterns {
            let _ = writeln!(out, "- {}: {}", pattern.kind(), pattern.description());
            if let Some(cause) = pattern.likely_cause() {
                let _ = writeln!(out, "  Likely cause: {}", cause);
            }
        }
        out.push('\n');
    }

    if !flow.trigger_chain.is_empty() {
        let _ = writeln!(out, "=== Callback/Trigger Chain ===");
        for (trigger, target) in &flow.trigger_chain {
            let _ = writeln!(out, "- {} -> {}", trigger, target);
        }
        out.push('\n');
    }

    if !findings.is_empty() {
        let _ = writeln!(out, "=== Source Code Locations ===");
        for strategy in [
            SearchStrategy::ControllerContextVerification,
            SearchStrategy::TransactionWrapper,
            SearchStrategy::CallbackDeclaration,
            SearchStrategy::IndividualQuery
        ] {
            for finding in findings
                .iter()
                .filter(|f| f.strategy == strategy)
                .take(FINDINGS_PER_STRATEGY)
            {
                let _ = writeln!(out, "[{}] {}", strategy, finding.query);
                for m in finding.matches.iter().take(2) {
                    let _ = writeln!(out, "  {}:{} ({})", m.file, m.line, m.confidence);
                    let _ = writeln!(out, "    {}", m.snippet);
                }
            }
        }
        out.push('\n');
    }

    let verified = findings
        .iter()
        .any(|f| f.strategy == SearchStrategy::ControllerContextVerification);
    if !verified
        && let Some(TransactionPattern::ControllerContext {
            inferred_context,
            warning,
            ..
        }) = flow.controller_contexts().next()
    {
        let _ = writeln!(out, "=== Inferred Context (not verified) ===");
        let _ = writeln!(out, "- SQL comments suggest: {}", inferred_context);
        let _ = writeln!(out, "  {}", warning);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;

    const LOG: &str = "\
2025-10-07T07:00:00.500000Z 7 Query BEGIN
2025-10-07T07:00:00.510000Z 7 Query INSERT INTO page_views (member_id) VALUES (48213) /*controller:work_pages,action:show*/
2025-10-07T07:00:00.515000Z 7 Query INSERT INTO audit_logs (member_id) VALUES (48213)
2025-10-07T07:00:00.600000Z 7 Query COMMIT";

    #[test]
    fn test_summary_sections() {
        let flow = TransactionFlow::analyze(LOG, &Thresholds::default());
        let summary = summarize(&flow, &[]);
        assert!(summary.starts_with("=== SQL Transaction Analysis ==="));
        assert!(summary.contains("Total queries: 4"));
        assert!(summary.contains("Tables affected: page_views, audit_logs"));
        assert!(summary.contains("Operations: BEGIN: 1, INSERT: 2, COMMIT: 1"));
        assert!(summary.contains("=== Callback/Trigger Chain ==="));
        assert!(summary.contains("- page_views#1 -> audit_logs#2"));
        assert!(summary.contains("SQL comments suggest: WorkPagesController#show"));
    }

    #[test]
    fn test_timeline_omits_identical_timestamps() {
        let flow = TransactionFlow::analyze(
            "BEGIN;\nINSERT INTO a (x) VALUES (1);\nCOMMIT;",
            &Thresholds::default()
        );
        let viz = visualize(&flow);
        assert_eq!(viz.timeline.len(), 3);
        assert_eq!(viz.timeline[1].operation, "INSERT a");
        assert_eq!(viz.timeline[0].operation, "BEGIN N/A");
        assert!(viz.timeline.iter().all(|s| s.timestamp.is_none()));

        let timed = TransactionFlow::analyze(LOG, &Thresholds::default());
        assert!(visualize(&timed).timeline[0].timestamp.is_some());
    }
}
