use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{SourceTracer, ToolResult, default_true};
use crate::{
    error::ToolError,
    transaction::{
        SourceFinding, SqlOperation, TransactionFlow, TransactionPattern, Visualization,
        find_source_code, summarize, visualize
    }
};

/// Input of the transaction tool
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub transaction_log:  String,
    #[serde(default = "default_true")]
    pub find_source_code: bool,
    #[serde(default)]
    pub max_patterns:     Option<usize>
}

impl TransactionInput {
    pub fn new(log: impl Into<String>) -> Self {
        Self {
            transaction_log:  log.into(),
            find_source_code: true,
            max_patterns:     None
        }
    }

    pub fn without_source(mut self) -> Self {
        self.find_source_code = false;
        self
    }
}

/// Output of the transaction tool
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub transaction_summary:  String,
    pub query_count:          usize,
    pub tables_affected:      Vec<String>,
    pub operation_types:      Vec<SqlOperation>,
    pub transaction_patterns: Vec<TransactionPattern>,
    pub trigger_chains:       Vec<(String, String)>,
    pub data_flow:            IndexMap<String, Vec<String>>,
    pub source_code_findings: Vec<SourceFinding>,
    pub visualization:        Visualization
}

impl SourceTracer {
    /// Reconstruct a transaction and, when a project is bound and
    /// `find_source_code` is set, correlate it with source code.
    ///
    /// Without a project the flow analysis is still returned, with no
    /// findings.
    pub async fn analyze_transaction(&mut self, input: &TransactionInput) -> ToolResult<TransactionReport> {
        let log = input.transaction_log.trim();
        if log.is_empty() {
            return Err(ToolError::new("Empty transaction log"));
        }

        let flow = TransactionFlow::analyze(log, &self.thresholds);
        let max_patterns = input.max_patterns.unwrap_or(self.limits.max_patterns);
        let max_results = self.limits.max_results;

        let findings = match self.engine.as_mut() {
            Some(engine) if input.find_source_code => {
                find_source_code(&flow, engine, max_patterns, max_results).await
            }
            _ => Vec::new()
        };

        Ok(TransactionReport {
            transaction_summary:  summarize(&flow, &findings),
            query_count:          flow.queries.len(),
            tables_affected:      flow.tables(),
            operation_types:      flow.operation_types(),
            visualization:        visualize(&flow),
            transaction_patterns: flow.patterns,
            trigger_chains:       flow.trigger_chain,
            data_flow:            flow.data_flow,
            source_code_findings: findings
        })
    }
}
