//! Convention rules that turn a [`QueryAnalysis`] into code search patterns.
//!
//! Each rule knows one ORM idiom (pagination, named scopes, associations,
//! ordering, persistence calls). It produces [`SearchPattern`]s, says where
//! in the tree to look, and scores candidate lines.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────────────────┐     ┌──────────────────┐
//! │ QueryAnalysis │────▶│ RuleSet                  │────▶│ applicable rules │
//! └───────────────┘     │  (predicate, rule) pairs │     └──────────────────┘
//!                       │  evaluated in order      │              │
//!                       └──────────────────────────┘              ▼
//!                                                   patterns, locations, validate_match
//! ```
//!
//! # Hard reject
//!
//! Every rule returns confidence `0.0` when the model name does not appear
//! literally in the matched line. Otherwise scoring starts from
//! [`Thresholds::rule_base_confidence`] and moves with structural markers
//! (limit-equivalent call, `.offset(`, `.order(`), never with literal values.
//!
//! # Implementing a rule
//!
//! ```
//! use sql_source_tracer::{
//!     config::Thresholds,
//!     query::{QueryAnalysis, analyze},
//!     rules::{ClauseType, RuleInfo, RuleSet, SearchLocation, SearchPattern, SearchRule}
//! };
//!
//! struct PluckRule;
//!
//! impl SearchRule for PluckRule {
//!     fn info(&self) -> RuleInfo {
//!         RuleInfo {
//!             id:   "PLUCK",
//!             name: "Pluck call"
//!         }
//!     }
//!
//!     fn search_locations(&self) -> &'static [SearchLocation] {
//!         &[SearchLocation {
//!             glob:     "app/**/*.rb",
//!             priority: 1
//!         }]
//!     }
//!
//!     fn build_patterns(&self, _analysis: &QueryAnalysis) -> Vec<SearchPattern> {
//!         vec![SearchPattern::required(r"\.pluck\(", 0.6, ClauseType::Model)]
//!     }
//!
//!     fn validate_match(&self, content: &str, _analysis: &QueryAnalysis) -> f64 {
//!         if content.contains(".pluck(") { 0.7 } else { 0.0 }
//!     }
//! }
//!
//! let mut rules = RuleSet::new(&Thresholds::default());
//! rules.push(|a| a.columns.len() == 1, Box::new(PluckRule));
//! let analysis = analyze("SELECT email FROM users");
//! assert!(rules.applicable(&analysis).iter().any(|r| r.info().id == "PLUCK"));
//! ```

mod association;
mod limit_offset;
mod order_by;
mod persistence;
mod scope;
mod types;

use std::sync::LazyLock;

pub use association::AssociationRule;
pub use limit_offset::LimitOffsetRule;
pub use order_by::OrderByRule;
pub use persistence::PersistenceRule;
use regex::Regex;
pub use scope::ScopeDefinitionRule;
pub use types::{ClauseType, RuleInfo, SearchLocation, SearchPattern};

use crate::{config::Thresholds, query::QueryAnalysis};

/// Idiomatic calls that bound a relation the way `LIMIT` does
pub const LIMIT_EQUIVALENT: &str =
    r"\.(limit|take|first|last|find_each|find_in_batches|in_batches|page|per)\b";
/// `.offset(` call
pub const OFFSET_CALL: &str = r"\.offset\(";
/// `.order(` call
pub const ORDER_CALL: &str = r"\.order\(";

static LIMIT_EQUIVALENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){}", LIMIT_EQUIVALENT)).expect("valid regex"));
static OFFSET_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){}", OFFSET_CALL)).expect("valid regex"));
static ORDER_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){}", ORDER_CALL)).expect("valid regex"));

/// A convention rule.
///
/// Rules are stateless apart from their thresholds and must be
/// `Send + Sync` so one set can serve parallel analyses.
pub trait SearchRule: Send + Sync {
    /// Identification for logs and match explanations
    fn info(&self) -> RuleInfo;

    /// Where this idiom usually lives, most likely first
    fn search_locations(&self) -> &'static [SearchLocation];

    /// Patterns for this statement, unordered
    fn build_patterns(&self, analysis: &QueryAnalysis) -> Vec<SearchPattern>;

    /// Confidence in `[0, 1]` that `content` issued the statement.
    ///
    /// `0.0` is a hard reject.
    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64;
}

/// Selects whether a rule applies to an analysis
pub type Predicate = fn(&QueryAnalysis) -> bool;

/// Ordered `(predicate, rule)` pairs
pub struct RuleSet {
    rules: Vec<(Predicate, Box<dyn SearchRule>)>
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(&Thresholds::default())
    }
}

impl RuleSet {
    /// The built-in rules, in evaluation order:
    /// scope, limit/offset, association, order, persistence
    pub fn new(thresholds: &Thresholds) -> Self {
        let base = thresholds.rule_base_confidence;
        let mut set = Self {
            rules: Vec::new()
        };
        set.push(has_where_conditions, Box::new(ScopeDefinitionRule::new(base)));
        set.push(|a| a.has_limit, Box::new(LimitOffsetRule::new(base)));
        set.push(
            QueryAnalysis::has_foreign_key_condition,
            Box::new(AssociationRule::new(base))
        );
        set.push(|a| a.has_order, Box::new(OrderByRule::new(base)));
        set.push(|a| a.intent.is_write(), Box::new(PersistenceRule::new(base)));
        set
    }

    /// Append a rule evaluated after the existing ones
    pub fn push(&mut self, predicate: Predicate, rule: Box<dyn SearchRule>) {
        self.rules.push((predicate, rule));
    }

    /// Rules whose predicate holds, in set order
    pub fn applicable(&self, analysis: &QueryAnalysis) -> Vec<&dyn SearchRule> {
        self.rules
            .iter()
            .filter(|(predicate, _)| predicate(analysis))
            .map(|(_, rule)| rule.as_ref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn has_where_conditions(analysis: &QueryAnalysis) -> bool {
    !analysis.where_conditions.is_empty()
}

/// Ids of the rules in `rules` that apply to `analysis`
pub fn applicable_rules(analysis: &QueryAnalysis, rules: &RuleSet) -> Vec<String> {
    rules
        .applicable(analysis)
        .iter()
        .map(|r| r.info().id.to_string())
        .collect()
}

/// Model name of the analysis if it appears literally in `content`
pub(crate) fn model_in<'a>(content: &str, analysis: &'a QueryAnalysis) -> Option<&'a str> {
    analysis
        .primary_model()
        .filter(|model| !model.is_empty() && content.contains(model))
}

pub(crate) fn has_limit_equivalent(content: &str) -> bool {
    LIMIT_EQUIVALENT_RE.is_match(content)
}

pub(crate) fn has_offset_call(content: &str) -> bool {
    OFFSET_CALL_RE.is_match(content)
}

pub(crate) fn has_order_call(content: &str) -> bool {
    ORDER_CALL_RE.is_match(content)
}

/// `+bonus` when the marker matches the expectation, `-bonus` otherwise
pub(crate) fn marker_bonus(expected: bool, present: bool, bonus: f64) -> f64 {
    match (expected, present) {
        (true, true) => bonus,
        (true, false) => -bonus,
        _ => 0.0
    }
}

pub(crate) fn clamp_confidence(score: f64) -> f64 {
    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze;

    #[test]
    fn test_rule_order_is_fixed() {
        let analysis = analyze(
            "SELECT * FROM page_views WHERE member_id = 1 ORDER BY id LIMIT 10 OFFSET 20"
        );
        let ids = applicable_rules(&analysis, &RuleSet::default());
        assert_eq!(ids, vec!["SCOPE_DEFINITION", "LIMIT_OFFSET", "ASSOCIATION", "ORDER_BY"]);
    }

    #[test]
    fn test_no_rules_for_bare_select() {
        let analysis = analyze("SELECT * FROM users");
        assert!(RuleSet::default().applicable(&analysis).is_empty());
    }

    #[test]
    fn test_marker_bonus() {
        assert_eq!(marker_bonus(true, true, 0.1), 0.1);
        assert_eq!(marker_bonus(true, false, 0.1), -0.1);
        assert_eq!(marker_bonus(false, true, 0.1), 0.0);
    }
}
