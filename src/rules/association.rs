use indexmap::IndexSet;

use super::{
    ClauseType, RuleInfo, SearchLocation, SearchPattern, SearchRule, clamp_confidence,
    has_limit_equivalent, model_in
};
use crate::query::QueryAnalysis;

const ASSOCIATION_BONUS: f64 = 0.1;
const LIMIT_BONUS: f64 = 0.1;

static LOCATIONS: [SearchLocation; 2] = [
    SearchLocation::new("app/models/**/*.rb", 1),
    SearchLocation::new("app/controllers/**/*.rb", 2)
];

/// Relations reached through a foreign key (`member.page_views.limit(5)`).
///
/// No wrapper-method names are assumed; only the chain shape and the
/// association declarations are searched.
pub struct AssociationRule {
    base: f64
}

impl AssociationRule {
    pub fn new(base: f64) -> Self {
        Self {
            base
        }
    }
}

/// Association names behind the foreign-key conditions, deduplicated
fn associations(analysis: &QueryAnalysis) -> IndexSet<&str> {
    analysis
        .foreign_keys()
        .filter_map(|c| c.association.as_deref())
        .collect()
}

impl SearchRule for AssociationRule {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "ASSOCIATION",
            name: "Association chain"
        }
    }

    fn search_locations(&self) -> &'static [SearchLocation] {
        &LOCATIONS
    }

    fn build_patterns(&self, analysis: &QueryAnalysis) -> Vec<SearchPattern> {
        let mut patterns = Vec::new();
        if analysis.has_limit {
            patterns.push(SearchPattern::required(
                r"\w+\.\w+.*\.(limit|take|first|last|find_each|in_batches|page|per)\b",
                0.55,
                ClauseType::Association
            ));
        }
        if analysis.has_offset {
            patterns.push(SearchPattern::required(
                r"\w+\.\w+.*\.offset\(",
                0.6,
                ClauseType::Association
            ));
        }
        let table = analysis
            .primary_table()
            .map(|t| t.name.rsplit('.').next().unwrap_or(&t.name).to_string());
        for assoc in associations(analysis) {
            let target = match &table {
                Some(table) => format!("{}|{}", regex::escape(assoc), regex::escape(table)),
                None => regex::escape(assoc)
            };
            patterns.push(SearchPattern::optional(
                format!(r"\b(has_many|belongs_to|has_one)\s+:({})\b", target),
                0.65,
                ClauseType::Association
            ));
        }
        patterns
    }

    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64 {
        if model_in(content, analysis).is_none() {
            return 0.0;
        }
        let lower = content.to_lowercase();
        let mut score = self.base;
        if associations(analysis).iter().any(|a| lower.contains(a)) {
            score += ASSOCIATION_BONUS;
        }
        if analysis.has_limit && has_limit_equivalent(content) {
            score += LIMIT_BONUS;
        }
        clamp_confidence(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze;

    #[test]
    fn test_declarations_are_optional() {
        let rule = AssociationRule::new(0.6);
        let analysis = analyze("SELECT * FROM page_views WHERE member_id = 7 LIMIT 5");
        let patterns = rule.build_patterns(&analysis);
        assert_eq!(patterns.len(), 2);
        assert!(!patterns[0].optional);
        assert!(patterns[1].optional);
        assert!(patterns[1].pattern.contains("member|page_views"));
    }

    #[test]
    fn test_association_name_bonus() {
        let rule = AssociationRule::new(0.6);
        let analysis = analyze("SELECT * FROM page_views WHERE member_id = 7 LIMIT 5");
        assert_eq!(rule.validate_match("PageView.where(member: m).limit(5)", &analysis), 0.8);
        assert_eq!(rule.validate_match("member.page_views.limit(5)", &analysis), 0.0);
    }
}
