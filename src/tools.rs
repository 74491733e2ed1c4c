//! Tool entry points.
//!
//! Two contracts sit on top of the engines:
//!
//! ```text
//! search_sql({sql, max_results?, include_usage_sites?})
//!     -> {fingerprint, matches, query_analysis, verification_command}
//!      | {error, suggestion?}
//!
//! analyze_transaction({transaction_log, find_source_code?, max_patterns?})
//!     -> {transaction_summary, query_count, tables_affected, operation_types,
//!         transaction_patterns, trigger_chains, data_flow,
//!         source_code_findings, visualization}
//!      | {error}
//! ```
//!
//! Neither entry point returns an infrastructure error. Every failure the
//! caller can act on comes back as a [`ToolError`] value.
//!
//! # Concurrency
//!
//! A [`SourceTracer`] owns one search engine and its caches. Calls take
//! `&mut self`; share an instance between tasks only behind a lock.

mod single;
mod transaction;
mod usage;

use std::path::PathBuf;

pub use single::{AnalysisSummary, SearchInput, SearchReport};
pub use transaction::{TransactionInput, TransactionReport};
pub use usage::find_usage_sites;

use crate::{
    config::{Config, LimitsConfig, Thresholds},
    error::ToolError,
    progressive::ProgressiveSearchEngine,
    search::CodeSearchEngine
};

/// Outcome of a tool call
pub type ToolResult<T> = Result<T, ToolError>;

pub(crate) const PROJECT_ROOT_NOT_FOUND: &str = "Project root not found";

fn default_true() -> bool {
    true
}

/// Long-lived tool host bound to one project tree
pub struct SourceTracer {
    root:       Option<PathBuf>,
    engine:     Option<ProgressiveSearchEngine>,
    thresholds: Thresholds,
    limits:     LimitsConfig
}

impl SourceTracer {
    /// Host for `config.project_root`.
    ///
    /// A missing or unusable root is not an error here; source searches
    /// report it when they are attempted.
    pub fn new(config: &Config) -> Self {
        let engine = config.project_root.as_ref().and_then(|root| {
            match CodeSearchEngine::new(root, &config.search) {
                Ok(search) => Some(ProgressiveSearchEngine::new(search, config.thresholds)),
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "project root unusable");
                    None
                }
            }
        });
        Self {
            root:       config.project_root.clone(),
            engine,
            thresholds: config.thresholds,
            limits:     config.limits
        }
    }

    pub fn project_root(&self) -> Option<&std::path::Path> {
        self.root.as_deref()
    }

    pub fn has_project(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&mut self) -> Option<&mut ProgressiveSearchEngine> {
        self.engine.as_mut()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }
}
