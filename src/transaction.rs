//! Transaction flow analysis.
//!
//! Reconstructs what happened inside one captured transaction: the ordered
//! statements, which values travelled between tables, which statements
//! probably caused others, and the structural patterns that hint at the
//! application code behind them.
//!
//! # Pipeline
//!
//! ```text
//!  log text
//!     │  parse::parse_log (general-log grammar, extractor fallback)
//!     ▼
//!  Vec<SqlQuery> ──flow::analyze_data_flow──▶ references + data_flow map
//!     │
//!     ├──flow::identify_trigger_chains──▶ (trigger, target) edges
//!     │
//!     └──patterns::detect_patterns──▶ cascade_insert, read_modify_write,
//!                                      bulk_operation, data_flow,
//!                                      controller_context
//! ```
//!
//! Source correlation ([`find_source_code`]) and the human-readable summary
//! ([`summarize`]) run on the finished [`TransactionFlow`].

mod flow;
mod parse;
mod patterns;
mod source;
mod summary;

pub use flow::{analyze_data_flow, identify_trigger_chains, time_diff_ms};
use indexmap::IndexMap;
pub use parse::{LogLine, parse_log, parse_log_line};
pub use patterns::{TransactionPattern, detect_patterns};
use serde::Serialize;
pub use source::{FindingMatch, SearchStrategy, SourceFinding, find_source_code};
pub use summary::{TimelineStep, TriggerEdge, Visualization, summarize, visualize};

use crate::config::Thresholds;

/// Operation of one statement, by leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Begin,
    Commit,
    Rollback,
    Other
}

impl SqlOperation {
    /// Classify by the first keyword, skipping leading comments
    pub fn from_sql(sql: &str) -> Self {
        let upper = strip_leading_comments(sql).to_uppercase();
        let mut words = upper.split(|c: char| c.is_whitespace() || c == ';' || c == '(');
        match words.next().unwrap_or_default() {
            "SELECT" | "WITH" => Self::Select,
            "INSERT" | "REPLACE" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "BEGIN" => Self::Begin,
            "START" if words.find(|w| !w.is_empty()) == Some("TRANSACTION") => Self::Begin,
            "COMMIT" => Self::Commit,
            "ROLLBACK" => Self::Rollback,
            _ => Self::Other
        }
    }

    /// INSERT or UPDATE, the statements worth correlating with source
    pub fn is_significant(self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }
}

impl std::fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Begin => write!(f, "BEGIN"),
            Self::Commit => write!(f, "COMMIT"),
            Self::Rollback => write!(f, "ROLLBACK"),
            Self::Other => write!(f, "OTHER")
        }
    }
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    while let Some(body) = rest.strip_prefix("/*") {
        match body.find("*/") {
            Some(end) => rest = body[end + 2..].trim_start(),
            None => break
        }
    }
    rest
}

/// One statement of a transaction, in log order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp:     Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// General-log command (`Query`, `Execute`, `Connect`, ...)
    pub query_type:    String,
    pub sql:           String,
    pub operation:     SqlOperation,
    pub table:         Option<String>,
    /// `origin_table#value` for values first seen in an earlier statement
    pub references:    Vec<String>
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let operation = SqlOperation::from_sql(&sql);
        let table = parse::primary_table(&sql, operation);
        Self {
            timestamp:     None,
            connection_id: None,
            query_type:    String::from("Query"),
            sql,
            operation,
            table,
            references:    Vec::new()
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `table#index`, the node name used in trigger edges
    pub fn node(&self, index: usize) -> String {
        format!("{}#{}", self.table.as_deref().unwrap_or("?"), index)
    }
}

/// Reconstructed transaction
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionFlow {
    pub queries:       Vec<SqlQuery>,
    pub trigger_chain: Vec<(String, String)>,
    /// Values first seen in a table that later statements reuse
    pub data_flow:     IndexMap<String, Vec<String>>,
    pub patterns:      Vec<TransactionPattern>
}

impl TransactionFlow {
    /// Parse a log and run every flow analysis over it
    pub fn analyze(log: &str, thresholds: &Thresholds) -> Self {
        let mut queries = parse_log(log);
        let data_flow = analyze_data_flow(&mut queries, thresholds);
        let trigger_chain = identify_trigger_chains(&queries, thresholds);
        let patterns = detect_patterns(&queries, thresholds);
        tracing::debug!(
            queries = queries.len(),
            edges = trigger_chain.len(),
            patterns = patterns.len(),
            "transaction flow"
        );
        Self {
            queries,
            trigger_chain,
            data_flow,
            patterns
        }
    }

    /// Distinct tables, in order of first appearance
    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for table in self.queries.iter().filter_map(|q| q.table.as_ref()) {
            if !tables.contains(table) {
                tables.push(table.clone());
            }
        }
        tables
    }

    /// Distinct operations, in order of first appearance
    pub fn operation_types(&self) -> Vec<SqlOperation> {
        self.operation_counts().into_keys().collect()
    }

    pub fn operation_counts(&self) -> IndexMap<SqlOperation, usize> {
        let mut counts = IndexMap::new();
        for query in &self.queries {
            *counts.entry(query.operation).or_insert(0) += 1;
        }
        counts
    }

    /// Controller/action pairs named in SQL comments
    pub fn controller_contexts(&self) -> impl Iterator<Item = &TransactionPattern> {
        self.patterns
            .iter()
            .filter(|p| matches!(p, TransactionPattern::ControllerContext { .. }))
    }

    /// First timestamp of the log, if any
    pub fn started_at(&self) -> Option<&str> {
        self.queries.iter().find_map(|q| q.timestamp.as_deref())
    }
}
