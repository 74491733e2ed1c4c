//! Regex heuristics used when no dialect can parse the statement.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use super::{
    hints::rails_patterns,
    types::{
        ColumnReference, Complexity, ParseSource, QueryAnalysis, QueryIntent, TableReference,
        ValueKind, WhereCondition
    }
};

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|INTO|UPDATE|JOIN)\s+[`"]?(\w+(?:\.\w+)?)"#).expect("valid regex")
});
static EXISTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+1\s+AS\s+one\b").expect("valid regex"));
static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+COUNT\s*\(").expect("valid regex"));
static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("valid regex"));
static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOFFSET\s+(\d+)?").expect("valid regex"));
static ORDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bORDER\s+BY\s+[`\x22]?(?:\w+\.)?(\w+)").expect("valid regex"));
static WHERE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bWHERE\b(.*?)(?:\bORDER\s+BY\b|\bGROUP\s+BY\b|\bLIMIT\b|\bOFFSET\b|;|$)")
        .expect("valid regex")
});
static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[`"]?(?:\w+[`"]?\.[`"]?)?(\w+)[`"]?\s*(=|!=|<>|<=|>=|<|>)\s*(\?|\$\d+|'[^']*'|-?\d+(?:\.\d+)?|\w+)"#)
        .expect("valid regex")
});
static INSERT_COLUMNS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)INSERT\s+INTO\s+[`"]?\w+[`"]?\s*\(([^)]+)\)"#).expect("valid regex")
});

/// Degraded analysis for statements no dialect could parse
pub fn analyze(sql: &str) -> QueryAnalysis {
    let mut analysis = QueryAnalysis::empty(sql, ParseSource::Fallback);

    let mut tables = IndexSet::new();
    for cap in TABLE_RE.captures_iter(sql) {
        tables.insert(cap[1].to_string());
    }
    analysis.tables = tables
        .iter()
        .map(|name| TableReference::new(name, None))
        .collect();

    let leading = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    analysis.intent = if EXISTENCE_RE.is_match(sql) {
        QueryIntent::ExistenceCheck
    } else if COUNT_RE.is_match(sql) {
        QueryIntent::CountAggregate
    } else {
        match leading.as_str() {
            "INSERT" => QueryIntent::DataInsertion,
            "UPDATE" => QueryIntent::DataUpdate,
            "DELETE" => QueryIntent::DataDeletion,
            "BEGIN" | "START" | "COMMIT" | "ROLLBACK" => QueryIntent::TransactionControl,
            _ => QueryIntent::DataRetrieval
        }
    };

    if let Some(cap) = LIMIT_RE.captures(sql) {
        analysis.has_limit = true;
        analysis.limit = cap[1].parse().ok();
    }
    if let Some(cap) = OFFSET_RE.captures(sql) {
        analysis.has_offset = true;
        analysis.offset = cap.get(1).and_then(|m| m.as_str().parse().ok());
    }
    if let Some(cap) = ORDER_RE.captures(sql) {
        analysis.has_order = true;
        analysis.order_columns.push(cap[1].into());
    }
    if let Some(cap) = WHERE_RE.captures(sql) {
        for cond in CONDITION_RE.captures_iter(&cap[1]) {
            let value = &cond[3];
            let value_kind = if value == "?" || value.starts_with('$') {
                ValueKind::Parameter
            } else if value.starts_with('\'') || value.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.') {
                ValueKind::Literal
            } else {
                ValueKind::Column
            };
            analysis.where_conditions.push(WhereCondition {
                column:   ColumnReference::new(&cond[1], None),
                operator: cond[2].into(),
                value_kind,
                value:    Some(value.trim_matches('\'').to_string())
            });
        }
    }
    if let Some(cap) = INSERT_COLUMNS_RE.captures(sql) {
        for col in cap[1].split(',') {
            let col = col.trim().trim_matches(|c: char| c == '`' || c == '"');
            if !col.is_empty() {
                analysis.write_columns.push(col.into());
            }
        }
    }

    analysis.columns = analysis
        .where_conditions
        .iter()
        .map(|c| c.column.clone())
        .collect();
    analysis.complexity = Complexity::Unknown;
    analysis.rails_patterns = rails_patterns(&analysis);
    analysis
}
