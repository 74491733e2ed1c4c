use serde::{Deserialize, Serialize};

use super::{PROJECT_ROOT_NOT_FOUND, SourceTracer, ToolResult, default_true, find_usage_sites};
use crate::{
    error::ToolError,
    normalizer::{classify, extract},
    progressive::{RankedMatch, sort_matches},
    query::{
        Complexity, ParseSource, QueryAnalysis, QueryIntent, analyze, fingerprint,
        verification_command
    }
};

const TRANSACTION_REDIRECT: &str = "Transaction log detected. Use transaction_analyzer tool instead.";
const TRANSACTION_SUGGESTION: &str = "This appears to be a complete transaction log with multiple queries. Use the transaction_analyzer tool to analyze the entire transaction flow and find related source code.";

/// Input of the single-query tool
#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    pub sql:                 String,
    #[serde(default)]
    pub max_results:         Option<usize>,
    #[serde(default = "default_true")]
    pub include_usage_sites: bool
}

impl SearchInput {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql:                 sql.into(),
            max_results:         None,
            include_usage_sites: true
        }
    }

    /// Report definitions only
    pub fn without_usage_sites(mut self) -> Self {
        self.include_usage_sites = false;
        self
    }
}

/// Compact view of the analysis behind a search
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub intent:           QueryIntent,
    pub tables:           Vec<String>,
    pub models:           Vec<String>,
    pub complexity:       Complexity,
    pub rails_patterns:   Vec<String>,
    pub where_conditions: usize,
    pub has_joins:        bool,
    pub parsed_with:      ParseSource
}

impl From<&QueryAnalysis> for AnalysisSummary {
    fn from(analysis: &QueryAnalysis) -> Self {
        Self {
            intent:           analysis.intent,
            tables:           analysis.tables.iter().map(|t| t.name.to_string()).collect(),
            models:           analysis.tables.iter().map(|t| t.model.clone()).collect(),
            complexity:       analysis.complexity,
            rails_patterns:   analysis.rails_patterns.clone(),
            where_conditions: analysis.where_conditions.len(),
            has_joins:        !analysis.joins.is_empty(),
            parsed_with:      analysis.parsed_with
        }
    }
}

/// Output of the single-query tool
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub fingerprint:          String,
    pub matches:              Vec<RankedMatch>,
    pub query_analysis:       AnalysisSummary,
    /// Command the caller may run to reproduce the query; never run here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_command: Option<String>
}

impl SourceTracer {
    /// Ranked source locations for one SQL statement.
    ///
    /// Log-wrapped input is normalized first. Input that is really a
    /// transaction log is refused with a suggestion to use
    /// [`analyze_transaction`](Self::analyze_transaction).
    pub async fn search_sql(&mut self, input: &SearchInput) -> ToolResult<SearchReport> {
        let raw = input.sql.trim();
        if raw.is_empty() {
            return Err(ToolError::new("Empty SQL query"));
        }

        let classification = classify(raw);
        if classification.should_use_transaction_analyzer() {
            tracing::debug!(reason = %classification.reason, "routing mismatch");
            return Err(ToolError::new(TRANSACTION_REDIRECT)
                .with_suggestion(TRANSACTION_SUGGESTION)
                .with_classification(classification.query_count, classification.reason));
        }

        let extracted = extract(raw);
        let sql = match extracted.as_slice() {
            [only] if !only.sql.trim().is_empty() => only.sql.trim().to_string(),
            _ => raw.to_string()
        };

        let max_results = input.max_results.unwrap_or(self.limits.max_results);
        let Some(engine) = self.engine.as_mut() else {
            return Err(ToolError::new(PROJECT_ROOT_NOT_FOUND));
        };

        let analysis = analyze(&sql);
        tracing::debug!(
            intent = %analysis.intent,
            model = analysis.primary_model().unwrap_or_default(),
            complexity = ?analysis.complexity,
            "query analysis"
        );

        let mut matches = if analysis.primary_model().is_some() {
            engine.search_progressive(&analysis, max_results).await
        } else {
            Vec::new()
        };
        if input.include_usage_sites && !matches.is_empty() {
            let usages = find_usage_sites(engine.code_search(), &matches).await;
            matches.extend(usages);
        }
        sort_matches(&mut matches);
        matches.truncate(max_results);

        Ok(SearchReport {
            fingerprint:          fingerprint(&analysis),
            matches,
            query_analysis:       AnalysisSummary::from(&analysis),
            verification_command: verification_command(&analysis)
        })
    }
}
