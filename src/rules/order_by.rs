use super::{
    ClauseType, ORDER_CALL, RuleInfo, SearchLocation, SearchPattern, SearchRule,
    clamp_confidence, has_limit_equivalent, has_order_call, model_in
};
use crate::query::QueryAnalysis;

const ORDER_BONUS: f64 = 0.1;
const MISSING_ORDER_PENALTY: f64 = 0.2;
/// `.order(...).limit(...)` is the usual pagination idiom
const PAGINATION_BONUS: f64 = 0.15;

static LOCATIONS: [SearchLocation; 2] = [
    SearchLocation::new("app/**/*.rb", 1),
    SearchLocation::new("lib/**/*.rb", 2)
];

/// `ORDER BY` through `.order(...)`
pub struct OrderByRule {
    base: f64
}

impl OrderByRule {
    pub fn new(base: f64) -> Self {
        Self {
            base
        }
    }
}

impl SearchRule for OrderByRule {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "ORDER_BY",
            name: "Order call"
        }
    }

    fn search_locations(&self) -> &'static [SearchLocation] {
        &LOCATIONS
    }

    fn build_patterns(&self, _analysis: &QueryAnalysis) -> Vec<SearchPattern> {
        vec![SearchPattern::required(ORDER_CALL, 0.4, ClauseType::Order)]
    }

    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64 {
        if model_in(content, analysis).is_none() {
            return 0.0;
        }
        let mut score = self.base;
        if has_order_call(content) {
            score += ORDER_BONUS;
            if analysis.has_limit && has_limit_equivalent(content) {
                score += PAGINATION_BONUS;
            }
        } else {
            score -= MISSING_ORDER_PENALTY;
        }
        clamp_confidence(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze;

    #[test]
    fn test_pagination_idiom_bonus() {
        let rule = OrderByRule::new(0.6);
        let analysis = analyze("SELECT * FROM posts ORDER BY created_at DESC LIMIT 20");
        assert_eq!(rule.validate_match("Post.order(created_at: :desc).limit(20)", &analysis), 0.85);
        assert_eq!(rule.validate_match("Post.order(:created_at)", &analysis), 0.7);
        assert_eq!(rule.validate_match("Post.recent", &analysis), 0.4);
    }
}
