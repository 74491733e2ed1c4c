use super::{
    ClauseType, LIMIT_EQUIVALENT, OFFSET_CALL, RuleInfo, SearchLocation, SearchPattern,
    SearchRule, clamp_confidence, has_limit_equivalent, has_offset_call, has_order_call,
    marker_bonus, model_in
};
use crate::query::QueryAnalysis;

const LIMIT_BONUS: f64 = 0.15;
const OFFSET_BONUS: f64 = 0.15;
const ORDER_BONUS: f64 = 0.05;

/// Batch contexts come before generic controllers
static LOCATIONS: [SearchLocation; 4] = [
    SearchLocation::new("app/mailers/**/*.rb", 1),
    SearchLocation::new("lib/**/*.rb", 2),
    SearchLocation::new("app/jobs/**/*.rb", 3),
    SearchLocation::new("app/controllers/**/*.rb", 4)
];

/// Pagination and batching: `LIMIT` and `OFFSET`
pub struct LimitOffsetRule {
    base: f64
}

impl LimitOffsetRule {
    pub fn new(base: f64) -> Self {
        Self {
            base
        }
    }
}

impl SearchRule for LimitOffsetRule {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "LIMIT_OFFSET",
            name: "Limit/offset pagination"
        }
    }

    fn search_locations(&self) -> &'static [SearchLocation] {
        &LOCATIONS
    }

    fn build_patterns(&self, analysis: &QueryAnalysis) -> Vec<SearchPattern> {
        let mut patterns = vec![SearchPattern::required(
            LIMIT_EQUIVALENT,
            0.5,
            ClauseType::Limit
        )];
        if analysis.has_offset {
            patterns.push(SearchPattern::required(OFFSET_CALL, 0.7, ClauseType::Offset));
        }
        patterns
    }

    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64 {
        if model_in(content, analysis).is_none() {
            return 0.0;
        }
        let mut score = self.base;
        score += marker_bonus(true, has_limit_equivalent(content), LIMIT_BONUS);
        score += marker_bonus(analysis.has_offset, has_offset_call(content), OFFSET_BONUS);
        if analysis.has_order && has_order_call(content) {
            score += ORDER_BONUS;
        }
        clamp_confidence(score)
    }
}
