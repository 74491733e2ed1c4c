//! Structural patterns in a statement sequence.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use super::{SqlOperation, SqlQuery, time_diff_ms};
use crate::{config::Thresholds, inflect::camelize};

static QUOTED_CONTROLLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'controller'\s*[,=]\s*'([^']+)'").expect("valid regex"));
static QUOTED_ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'action'\s*[,=]\s*'([^']+)'").expect("valid regex"));
static CONTROLLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"controller:([A-Za-z0-9_/]+)").expect("valid regex"));
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"action:([A-Za-z0-9_]+)").expect("valid regex"));

const CASCADE_CAUSE: &str = "ActiveRecord callback (after_create, after_save) or observer";
const READ_MODIFY_WRITE_CAUSE: &str = "Counter cache, optimistic locking, or calculated field update";
const BULK_CAUSE: &str = "Batch processing, analytics updates, or data migration";
const DATA_FLOW_CAUSE: &str = "Foreign key relationship or data dependency";
const CONTEXT_WARNING: &str = "Inferred from SQL comments - not verified against actual source code";
/// Status carried by every controller context read from SQL comments
pub const INFERRED_STATUS: &str = "inferred, unverified";
/// Same operation on the same table more than this many times is bulk
const BULK_MIN_COUNT: usize = 2;

/// A detected pattern with its likely cause
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pattern_type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransactionPattern {
    /// INSERT followed by another INSERT inside the cascade window
    CascadeInsert {
        sequence:     [String; 2],
        description:  String,
        likely_cause: &'static str
    },
    /// SELECT immediately followed by UPDATE of the same table
    ReadModifyWrite {
        table:        String,
        description:  String,
        likely_cause: &'static str
    },
    BulkOperation {
        operation:    SqlOperation,
        table:        String,
        count:        usize,
        description:  String,
        likely_cause: &'static str
    },
    /// Values from one table reused by statements on another
    DataFlow {
        from_table:   String,
        to_table:     String,
        operations:   Vec<SqlOperation>,
        count:        usize,
        description:  String,
        likely_cause: &'static str
    },
    /// Controller/action named in SQL comments, never verified here
    ControllerContext {
        controller:       String,
        action:           String,
        table:            Option<String>,
        inferred_context: String,
        source_type:      &'static str,
        status:           &'static str,
        description:      String,
        warning:          &'static str
    }
}

impl TransactionPattern {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CascadeInsert {
                ..
            } => "cascade_insert",
            Self::ReadModifyWrite {
                ..
            } => "read_modify_write",
            Self::BulkOperation {
                ..
            } => "bulk_operation",
            Self::DataFlow {
                ..
            } => "data_flow",
            Self::ControllerContext {
                ..
            } => "controller_context"
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::CascadeInsert {
                description, ..
            }
            | Self::ReadModifyWrite {
                description, ..
            }
            | Self::BulkOperation {
                description, ..
            }
            | Self::DataFlow {
                description, ..
            }
            | Self::ControllerContext {
                description, ..
            } => description.as_str()
        }
    }

    /// Rationale for structural patterns; `None` for inferred context
    pub fn likely_cause(&self) -> Option<&'static str> {
        match self {
            Self::CascadeInsert {
                likely_cause, ..
            }
            | Self::ReadModifyWrite {
                likely_cause, ..
            }
            | Self::BulkOperation {
                likely_cause, ..
            }
            | Self::DataFlow {
                likely_cause, ..
            } => Some(*likely_cause),
            Self::ControllerContext {
                ..
            } => None
        }
    }
}

/// Every pattern found in `queries`, grouped by kind in a fixed order
pub fn detect_patterns(queries: &[SqlQuery], thresholds: &Thresholds) -> Vec<TransactionPattern> {
    let mut patterns = cascade_inserts(queries, thresholds);
    patterns.extend(read_modify_writes(queries));
    patterns.extend(bulk_operations(queries));
    patterns.extend(data_flows(queries));
    patterns.extend(controller_contexts(queries));
    patterns
}

fn cascade_inserts(queries: &[SqlQuery], thresholds: &Thresholds) -> Vec<TransactionPattern> {
    let inserts: Vec<&SqlQuery> = queries
        .iter()
        .filter(|q| q.operation == SqlOperation::Insert)
        .collect();
    let mut seen: Vec<(&str, &str)> = Vec::new();
    let mut out = Vec::new();
    for pair in inserts.windows(2) {
        let [first, second] = pair else {
            continue;
        };
        let (Some(a), Some(b)) = (first.table.as_deref(), second.table.as_deref()) else {
            continue;
        };
        let diff = time_diff_ms(first.timestamp.as_deref(), second.timestamp.as_deref());
        if diff >= thresholds.cascade_window_ms || seen.contains(&(a, b)) {
            continue;
        }
        seen.push((a, b));
        out.push(TransactionPattern::CascadeInsert {
            sequence:     [a.to_string(), b.to_string()],
            description:  format!("INSERT into {} triggers INSERT into {}", a, b),
            likely_cause: CASCADE_CAUSE
        });
    }
    out
}

fn read_modify_writes(queries: &[SqlQuery]) -> Vec<TransactionPattern> {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for pair in queries.windows(2) {
        let [read, write] = pair else {
            continue;
        };
        if read.operation != SqlOperation::Select || write.operation != SqlOperation::Update {
            continue;
        }
        let Some(table) = read.table.as_deref() else {
            continue;
        };
        if write.table.as_deref() != Some(table) || seen.contains(&table) {
            continue;
        }
        seen.push(table);
        out.push(TransactionPattern::ReadModifyWrite {
            table:        table.to_string(),
            description:  format!("SELECT from {} immediately followed by UPDATE", table),
            likely_cause: READ_MODIFY_WRITE_CAUSE
        });
    }
    out
}

fn bulk_operations(queries: &[SqlQuery]) -> Vec<TransactionPattern> {
    let mut groups: IndexMap<(SqlOperation, &str), usize> = IndexMap::new();
    for query in queries {
        if let Some(table) = query.table.as_deref() {
            *groups.entry((query.operation, table)).or_insert(0) += 1;
        }
    }
    groups
        .into_iter()
        .filter(|(_, count)| *count > BULK_MIN_COUNT)
        .map(|((operation, table), count)| TransactionPattern::BulkOperation {
            operation,
            table:        table.to_string(),
            count,
            description:  format!("Multiple {} operations on {}", operation, table),
            likely_cause: BULK_CAUSE
        })
        .collect()
}

fn data_flows(queries: &[SqlQuery]) -> Vec<TransactionPattern> {
    let mut flows: IndexMap<(&str, &str), (Vec<SqlOperation>, usize)> = IndexMap::new();
    for query in queries {
        let Some(to_table) = query.table.as_deref() else {
            continue;
        };
        for reference in &query.references {
            let from_table = reference.split('#').next().unwrap_or(reference);
            let (operations, count) = flows.entry((from_table, to_table)).or_default();
            if !operations.contains(&query.operation) {
                operations.push(query.operation);
            }
            *count += 1;
        }
    }
    flows
        .into_iter()
        .map(|((from, to), (mut operations, count))| {
            operations.sort();
            TransactionPattern::DataFlow {
                from_table:   from.to_string(),
                to_table:     to.to_string(),
                operations,
                count,
                description:  format!(
                    "Value from {} used in {} operations ({} times)",
                    from, to, count
                ),
                likely_cause: DATA_FLOW_CAUSE
            }
        })
        .collect()
}

/// `controller` / `action` pair from a SQL comment
fn comment_context(sql: &str) -> Option<(String, String)> {
    let capture = |re: &Regex| {
        re.captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };
    match (capture(&QUOTED_CONTROLLER_RE), capture(&QUOTED_ACTION_RE)) {
        (Some(controller), Some(action)) => Some((controller, action)),
        _ => Some((capture(&CONTROLLER_RE)?, capture(&ACTION_RE)?))
    }
}

/// `admin/work_pages` -> `Admin::WorkPagesController`
fn controller_class(controller: &str) -> String {
    let path = controller
        .split('/')
        .filter(|part| !part.is_empty())
        .map(camelize)
        .collect::<Vec<_>>()
        .join("::");
    format!("{}Controller", path)
}

fn controller_contexts(queries: &[SqlQuery]) -> Vec<TransactionPattern> {
    let mut seen: Vec<(String, String)> = Vec::new();
    let mut out = Vec::new();
    for query in queries {
        let Some((controller, action)) = comment_context(&query.sql) else {
            continue;
        };
        let key = (controller.clone(), action.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(TransactionPattern::ControllerContext {
            inferred_context: format!("{}#{}", controller_class(&controller), action),
            description:      format!("Operation in context of {}#{}", controller, action),
            table:            query.table.clone(),
            controller,
            action,
            source_type:      "sql_metadata",
            status:           INFERRED_STATUS,
            warning:          CONTEXT_WARNING
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sql: &str, ts: &str) -> SqlQuery {
        SqlQuery::new(sql).with_timestamp(Some(ts.to_string()))
    }

    #[test]
    fn test_cascade_insert_cause_mentions_callback() {
        let queries = vec![
            query("INSERT INTO page_views (member_id) VALUES (1)", "2025-10-07T07:00:00.500Z"),
            query("INSERT INTO audit_logs (member_id) VALUES (1)", "2025-10-07T07:00:00.510Z"),
        ];
        let patterns = detect_patterns(&queries, &Thresholds::default());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind(), "cascade_insert");
        assert_eq!(
            patterns[0].description(),
            "INSERT into page_views triggers INSERT into audit_logs"
        );
        assert!(patterns[0].likely_cause().is_some_and(|c| c.contains("callback")));
    }

    #[test]
    fn test_read_modify_write_once_per_table() {
        let queries = vec![
            SqlQuery::new("SELECT * FROM counters WHERE id = 1"),
            SqlQuery::new("UPDATE counters SET n = 2 WHERE id = 1"),
            SqlQuery::new("SELECT * FROM counters WHERE id = 1"),
            SqlQuery::new("UPDATE counters SET n = 3 WHERE id = 1"),
        ];
        let rmw: Vec<_> = read_modify_writes(&queries);
        assert_eq!(rmw.len(), 1);
        assert_eq!(rmw[0].description(), "SELECT from counters immediately followed by UPDATE");
    }

    #[test]
    fn test_bulk_operation_needs_three() {
        let two = vec![
            SqlQuery::new("UPDATE stats SET n = 1 WHERE id = 1"),
            SqlQuery::new("UPDATE stats SET n = 1 WHERE id = 2"),
        ];
        assert!(bulk_operations(&two).is_empty());

        let mut three = two.clone();
        three.push(SqlQuery::new("UPDATE stats SET n = 1 WHERE id = 3"));
        let bulk = bulk_operations(&three);
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk[0].description(), "Multiple UPDATE operations on stats");
    }

    #[test]
    fn test_data_flow_aggregates_references() {
        let mut target = SqlQuery::new("INSERT INTO audit_logs (member_id) VALUES (48213)");
        target.references = vec![String::from("page_views#48213"), String::from("page_views#show")];
        let flows = data_flows(&[target]);
        assert_eq!(flows.len(), 1);
        assert_eq!(
            flows[0].description(),
            "Value from page_views used in audit_logs operations (2 times)"
        );
    }

    #[test]
    fn test_controller_context_is_inferred_only() {
        let queries = vec![
            SqlQuery::new(
                "SELECT * FROM work_pages WHERE id = 1 /*application:Web,controller:work_pages,action:show_as_tab*/"
            ),
            SqlQuery::new(
                "UPDATE work_pages SET views = 2 /*controller:work_pages,action:show_as_tab*/"
            ),
        ];
        let contexts = controller_contexts(&queries);
        assert_eq!(contexts.len(), 1);
        let TransactionPattern::ControllerContext {
            inferred_context,
            status,
            ..
        } = &contexts[0]
        else {
            panic!("expected controller context");
        };
        assert_eq!(inferred_context, "WorkPagesController#show_as_tab");
        assert_eq!(*status, "inferred, unverified");
        assert!(contexts[0].likely_cause().is_none());
    }

    #[test]
    fn test_quoted_controller_pair() {
        assert_eq!(
            comment_context("SELECT 1 -- {'controller'='admin/users','action'='index'}"),
            Some((String::from("admin/users"), String::from("index")))
        );
        assert_eq!(controller_class("admin/users"), "Admin::UsersController");
        assert!(comment_context("SELECT 1").is_none());
    }
}
