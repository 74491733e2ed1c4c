use std::sync::LazyLock;

use regex::Regex;

use super::{
    ClauseType, RuleInfo, SearchLocation, SearchPattern, SearchRule, clamp_confidence,
    has_limit_equivalent, has_offset_call, marker_bonus, model_in
};
use crate::query::QueryAnalysis;

const CHAIN_BONUS: f64 = 0.1;
const LIMIT_BONUS: f64 = 0.1;
const OFFSET_BONUS: f64 = 0.1;
const SCOPE_KEYWORD_BONUS: f64 = 0.05;

static LOCATIONS: [SearchLocation; 2] = [
    SearchLocation::new("app/models/**/*.rb", 1),
    SearchLocation::new("app/**/*.rb", 2)
];

static SCOPE_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bscope\s*[:(]").expect("valid regex"));

/// Named scopes and model-anchored method chains.
///
/// Column names rarely survive behind a named scope, so patterns follow the
/// chain shape (`Model.something...limit`) rather than the WHERE columns.
pub struct ScopeDefinitionRule {
    base: f64
}

impl ScopeDefinitionRule {
    pub fn new(base: f64) -> Self {
        Self {
            base
        }
    }
}

fn chain_re(model: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\.\w+", regex::escape(model))).ok()
}

impl SearchRule for ScopeDefinitionRule {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "SCOPE_DEFINITION",
            name: "Scope or model chain"
        }
    }

    fn search_locations(&self) -> &'static [SearchLocation] {
        &LOCATIONS
    }

    fn build_patterns(&self, analysis: &QueryAnalysis) -> Vec<SearchPattern> {
        let Some(model) = analysis.primary_model() else {
            return Vec::new();
        };
        let model = regex::escape(model);
        let mut patterns = Vec::new();
        if analysis.has_limit {
            patterns.push(SearchPattern::required(
                format!(
                    r"\b{}\.\w+.*\.(limit|take|first|last|find_each|find_in_batches|in_batches|page|per)\b",
                    model
                ),
                0.8,
                ClauseType::Scope
            ));
        }
        if analysis.has_offset {
            patterns.push(SearchPattern::required(
                format!(r"\b{}\.\w+.*\.offset\(", model),
                0.85,
                ClauseType::Scope
            ));
        }
        patterns.push(SearchPattern::required(
            format!(r"\b{}\.\w+", model),
            0.3,
            ClauseType::Model
        ));
        patterns.push(SearchPattern::optional(r"\bscope\s*[:(]", 0.6, ClauseType::Scope));
        patterns
    }

    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64 {
        let Some(model) = model_in(content, analysis) else {
            return 0.0;
        };
        let mut score = self.base;
        if chain_re(model).is_some_and(|re| re.is_match(content)) {
            score += CHAIN_BONUS;
        }
        score += marker_bonus(analysis.has_limit, has_limit_equivalent(content), LIMIT_BONUS);
        score += marker_bonus(analysis.has_offset, has_offset_call(content), OFFSET_BONUS);
        if SCOPE_KEYWORD_RE.is_match(content) {
            score += SCOPE_KEYWORD_BONUS;
        }
        clamp_confidence(score)
    }
}
