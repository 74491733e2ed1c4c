//! Data flow and trigger chains.
//!
//! Identifier-like values (long numbers, short quoted words) are coarse
//! proxies for ids and keys. A value seen first in one table and again in a
//! later statement is recorded as a reference from that statement back to
//! the origin table.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use regex::Regex;

use super::{SqlOperation, SqlQuery};
use crate::config::Thresholds;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

struct TokenPatterns {
    numeric: Regex,
    quoted:  Regex
}

impl TokenPatterns {
    fn new(thresholds: &Thresholds) -> Option<Self> {
        let numeric = Regex::new(&format!(r"\b\d{{{},}}\b", thresholds.min_identifier_digits.max(1)));
        let quoted = Regex::new(&format!(
            r"'([a-zA-Z_]{{{},}})'",
            thresholds.min_quoted_token_len.max(1)
        ));
        match (numeric, quoted) {
            (Ok(numeric), Ok(quoted)) => Some(Self {
                numeric,
                quoted
            }),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(error = %err, "invalid identifier token pattern");
                None
            }
        }
    }

    /// Distinct tokens of one statement, numbers first
    fn tokens(&self, sql: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let numbers = self.numeric.find_iter(sql).map(|m| m.as_str());
        let words = self
            .quoted
            .captures_iter(sql)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str());
        for token in numbers.chain(words) {
            if !out.iter().any(|t| t == token) {
                out.push(token.to_string());
            }
        }
        out
    }
}

/// Fill `references` on every query and return the per-table data-flow map.
///
/// Every table touched by the log gets an entry, possibly empty, holding the
/// values first seen there that some later statement reuses.
pub fn analyze_data_flow(
    queries: &mut [SqlQuery],
    thresholds: &Thresholds
) -> IndexMap<String, Vec<String>> {
    let mut data_flow: IndexMap<String, Vec<String>> = IndexMap::new();
    let Some(patterns) = TokenPatterns::new(thresholds) else {
        return data_flow;
    };

    // value -> (origin table, occurrences)
    let mut origins: IndexMap<String, (String, usize)> = IndexMap::new();
    for query in queries.iter_mut() {
        let Some(table) = query.table.clone() else {
            continue;
        };
        data_flow.entry(table.clone()).or_default();
        for value in patterns.tokens(&query.sql) {
            match origins.get_mut(&value) {
                Some((origin, seen)) => {
                    *seen += 1;
                    query.references.push(format!("{}#{}", origin, value));
                }
                None => {
                    origins.insert(value, (table.clone(), 1));
                }
            }
        }
    }

    for (value, (origin, seen)) in origins {
        if seen > 1
            && let Some(values) = data_flow.get_mut(&origin)
        {
            values.push(value);
        }
    }
    data_flow
}

/// Inferred `(trigger, target)` edges, deduplicated in discovery order.
///
/// An INSERT triggers a later statement that references one of its table's
/// values. Consecutive INSERTs inside the cascade window are also linked.
pub fn identify_trigger_chains(queries: &[SqlQuery], thresholds: &Thresholds) -> Vec<(String, String)> {
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut push = |edge: (String, String)| {
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    };

    for (i, query) in queries.iter().enumerate() {
        if query.operation != SqlOperation::Insert {
            continue;
        }
        let Some(table) = query.table.as_deref() else {
            continue;
        };
        let prefix = format!("{}#", table);
        for (j, later) in queries.iter().enumerate().skip(i + 1) {
            if later.references.iter().any(|r| r.starts_with(&prefix)) {
                push((query.node(i), later.node(j)));
            }
        }
    }

    let inserts: Vec<(usize, &SqlQuery)> = queries
        .iter()
        .enumerate()
        .filter(|(_, q)| q.operation == SqlOperation::Insert && q.table.is_some())
        .collect();
    for pair in inserts.windows(2) {
        let [(i, first), (j, second)] = pair else {
            continue;
        };
        if first.table != second.table
            && time_diff_ms(first.timestamp.as_deref(), second.timestamp.as_deref())
                < thresholds.cascade_window_ms
        {
            push((first.node(*i), second.node(*j)));
        }
    }
    edges
}

/// Absolute distance between two log timestamps in milliseconds.
///
/// A missing or unparsable timestamp counts as no distance, so statements
/// from logs without timing are treated as simultaneous.
pub fn time_diff_ms(first: Option<&str>, second: Option<&str>) -> i64 {
    let parse = |ts: Option<&str>| ts.and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok());
    match (parse(first), parse(second)) {
        (Some(a), Some(b)) => (b - a).num_milliseconds().abs(),
        _ => 0
    }
}
