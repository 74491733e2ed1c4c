//! Log text to ordered statements.
//!
//! Lines in MySQL general-log shape
//! (`2025-10-07T07:00:00.500000Z  1791542 Query  SELECT ...`) open a new
//! statement and every other line continues the current one. Logs without
//! any such line go through the extractor instead, and merged transaction
//! blocks are split back into their statements.

use std::sync::LazyLock;

use regex::Regex;

use super::{SqlOperation, SqlQuery};
use crate::normalizer::{self, SqlType};

static LOG_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z)\s+(\d+)\s+(\w+)(?:\s+(.*))?$")
        .expect("valid regex")
});
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z)").expect("valid regex")
});

const TABLE_NAME: &str = r#"[`"\[]?([\w.]+)[`"\]]?"#;

static INTO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\bINTO\s+{}", TABLE_NAME)).expect("valid regex"));
static UPDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\bUPDATE\s+{}", TABLE_NAME)).expect("valid regex"));
static FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\bFROM\s+{}", TABLE_NAME)).expect("valid regex"));

/// One line of a general log that opens a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub timestamp:     &'a str,
    pub connection_id: &'a str,
    pub command:       &'a str,
    pub sql:           &'a str
}

/// Match one trimmed line against the general-log grammar
pub fn parse_log_line(line: &str) -> Option<LogLine<'_>> {
    let caps = LOG_LINE_RE.captures(line)?;
    Some(LogLine {
        timestamp:     caps.get(1)?.as_str(),
        connection_id: caps.get(2)?.as_str(),
        command:       caps.get(3)?.as_str(),
        sql:           caps.get(4).map(|m| m.as_str().trim()).unwrap_or_default()
    })
}

/// Statements of a transaction log, in log order
pub fn parse_log(log: &str) -> Vec<SqlQuery> {
    let has_grammar = log
        .lines()
        .any(|line| parse_log_line(line.trim()).is_some());
    if has_grammar {
        parse_general_log(log)
    } else {
        parse_extracted(log)
    }
}

fn parse_general_log(log: &str) -> Vec<SqlQuery> {
    let mut queries = Vec::new();
    let mut current: Option<SqlQuery> = None;

    for raw in log.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_log_line(line) {
            Some(entry) => {
                if let Some(done) = current.take() {
                    push_finished(&mut queries, done);
                }
                current = Some(SqlQuery {
                    timestamp:     Some(entry.timestamp.to_string()),
                    connection_id: Some(entry.connection_id.to_string()),
                    query_type:    entry.command.to_string(),
                    sql:           entry.sql.to_string(),
                    operation:     SqlOperation::Other,
                    table:         None,
                    references:    Vec::new()
                });
            }
            None => {
                if let Some(query) = current.as_mut() {
                    if !query.sql.is_empty() {
                        query.sql.push('\n');
                    }
                    query.sql.push_str(line);
                }
            }
        }
    }
    if let Some(done) = current {
        push_finished(&mut queries, done);
    }
    queries
}

/// Classify once the statement text is complete
fn push_finished(queries: &mut Vec<SqlQuery>, mut query: SqlQuery) {
    if query.sql.is_empty() {
        return;
    }
    query.operation = SqlOperation::from_sql(&query.sql);
    query.table = primary_table(&query.sql, query.operation);
    queries.push(query);
}

fn parse_extracted(log: &str) -> Vec<SqlQuery> {
    let mut queries = Vec::new();
    for stmt in normalizer::extract(log) {
        let timestamp = stmt
            .metadata_removed
            .as_deref()
            .and_then(|meta| TIMESTAMP_RE.captures(meta))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let parts = if stmt.sql_type == SqlType::Transaction {
            normalizer::split_transaction(&stmt.sql)
        } else {
            vec![stmt.sql.trim().trim_end_matches(';').trim().to_string()]
        };
        queries.extend(
            parts
                .into_iter()
                .filter(|part| !part.is_empty())
                .map(|part| SqlQuery::new(part).with_timestamp(timestamp.clone()))
        );
    }
    queries
}

/// Table named after the keyword that anchors `operation`
pub(crate) fn primary_table(sql: &str, operation: SqlOperation) -> Option<String> {
    let re: &Regex = match operation {
        SqlOperation::Insert => &INTO_RE,
        SqlOperation::Update => &UPDATE_RE,
        SqlOperation::Select | SqlOperation::Delete => &FROM_RE,
        _ => return None
    };
    re.captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERAL_LOG: &str = "\
2025-10-07T07:00:00.500000Z        1791542 Query START TRANSACTION
2025-10-07T07:00:00.510000Z        1791542 Query INSERT INTO `page_views` (`member_id`, `action`)
VALUES (12345, 'show_as_tab')
2025-10-07T07:00:00.520000Z        1791542 Query SELECT `members`.* FROM `members` WHERE `members`.`id` = 12345
2025-10-07T07:00:00.530000Z        1791542 Query COMMIT";

    #[test]
    fn test_parse_log_line() {
        let line = parse_log_line("2025-10-07T07:00:00.500000Z 42 Query SELECT 1").expect("matches");
        assert_eq!(line.timestamp, "2025-10-07T07:00:00.500000Z");
        assert_eq!(line.connection_id, "42");
        assert_eq!(line.command, "Query");
        assert_eq!(line.sql, "SELECT 1");
        assert!(parse_log_line("VALUES (1, 2)").is_none());
    }

    #[test]
    fn test_command_without_sql_takes_next_line() {
        let queries = parse_log(
            "2025-10-07T07:00:00.750000Z 1 Query\nSELECT 1 FROM users;\n2025-10-07T07:00:01.000000Z 1 Query COMMIT"
        );
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].sql, "SELECT 1 FROM users;");
        assert_eq!(queries[0].table.as_deref(), Some("users"));
    }

    #[test]
    fn test_general_log_continuations() {
        let queries = parse_log(GENERAL_LOG);
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0].operation, SqlOperation::Begin);
        assert_eq!(queries[1].operation, SqlOperation::Insert);
        assert_eq!(queries[1].table.as_deref(), Some("page_views"));
        assert!(queries[1].sql.contains("VALUES (12345"));
        assert_eq!(queries[2].table.as_deref(), Some("members"));
        assert_eq!(queries[3].operation, SqlOperation::Commit);
        assert_eq!(queries[3].connection_id.as_deref(), Some("1791542"));
    }

    #[test]
    fn test_plain_transaction_is_split() {
        let queries = parse_log(
            "BEGIN;\nINSERT INTO audit_logs (action) VALUES ('create');\nUPDATE members SET views = views + 1 WHERE id = 7;\nCOMMIT;"
        );
        let ops: Vec<_> = queries.iter().map(|q| q.operation).collect();
        assert_eq!(
            ops,
            vec![
                SqlOperation::Begin,
                SqlOperation::Insert,
                SqlOperation::Update,
                SqlOperation::Commit
            ]
        );
        assert_eq!(queries[2].table.as_deref(), Some("members"));
    }
}
