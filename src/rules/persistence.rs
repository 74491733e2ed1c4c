use std::sync::LazyLock;

use regex::Regex;

use super::{
    ClauseType, RuleInfo, SearchLocation, SearchPattern, SearchRule, clamp_confidence, model_in
};
use crate::query::{QueryAnalysis, QueryIntent};

const WRITE_CALL_BONUS: f64 = 0.15;
const GENERIC_CALL_BONUS: f64 = 0.05;
/// Scaled by the share of written columns named in the line
const COLUMN_BONUS: f64 = 0.15;

static LOCATIONS: [SearchLocation; 5] = [
    SearchLocation::new("app/models/**/*.rb", 1),
    SearchLocation::new("app/controllers/**/*.rb", 2),
    SearchLocation::new("app/jobs/**/*.rb", 3),
    SearchLocation::new("app/services/**/*.rb", 4),
    SearchLocation::new("lib/**/*.rb", 5)
];

const INSERT_CALLS: &str =
    "create|new|insert|insert_all|upsert|upsert_all|find_or_create_by|create_or_find_by";
const UPDATE_CALLS: &str = "update|update_all|update_attribute|update_column|update_columns|increment|decrement|increment_counter|touch|upsert";
const DELETE_CALLS: &str = "delete|delete_all|delete_by|destroy|destroy_all|destroy_by";
const GENERIC_WRITE: &str = r"\.(save|update|destroy)\b";

static GENERIC_WRITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GENERIC_WRITE).expect("valid regex"));

/// Writes issued through model class methods (`PageView.create(...)`)
pub struct PersistenceRule {
    base: f64
}

impl PersistenceRule {
    pub fn new(base: f64) -> Self {
        Self {
            base
        }
    }
}

fn write_calls(intent: QueryIntent) -> Option<&'static str> {
    match intent {
        QueryIntent::DataInsertion => Some(INSERT_CALLS),
        QueryIntent::DataUpdate => Some(UPDATE_CALLS),
        QueryIntent::DataDeletion => Some(DELETE_CALLS),
        _ => None
    }
}

impl SearchRule for PersistenceRule {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "PERSISTENCE",
            name: "Model write call"
        }
    }

    fn search_locations(&self) -> &'static [SearchLocation] {
        &LOCATIONS
    }

    fn build_patterns(&self, analysis: &QueryAnalysis) -> Vec<SearchPattern> {
        let (Some(model), Some(calls)) = (analysis.primary_model(), write_calls(analysis.intent))
        else {
            return Vec::new();
        };
        vec![
            SearchPattern::required(
                format!(r"\b{}\.({})\b", regex::escape(model), calls),
                0.7,
                ClauseType::Write
            ),
            SearchPattern::optional(GENERIC_WRITE, 0.35, ClauseType::Write),
        ]
    }

    fn validate_match(&self, content: &str, analysis: &QueryAnalysis) -> f64 {
        let Some(model) = model_in(content, analysis) else {
            return 0.0;
        };
        let mut score = self.base;
        let call_re = write_calls(analysis.intent).and_then(|calls| {
            Regex::new(&format!(r"\b{}\.({})\b", regex::escape(model), calls)).ok()
        });
        if call_re.is_some_and(|re| re.is_match(content)) {
            score += WRITE_CALL_BONUS;
        } else if GENERIC_WRITE_RE.is_match(content) {
            score += GENERIC_CALL_BONUS;
        }
        if !analysis.write_columns.is_empty() {
            let lower = content.to_lowercase();
            let named = analysis
                .write_columns
                .iter()
                .filter(|c| {
                    let col = c.to_lowercase();
                    lower.contains(&format!("{}:", col)) || lower.contains(&format!(":{}", col))
                })
                .count();
            score += COLUMN_BONUS * named as f64 / analysis.write_columns.len() as f64;
        }
        clamp_confidence(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze;

    #[test]
    fn test_insert_patterns() {
        let rule = PersistenceRule::new(0.6);
        let analysis = analyze("INSERT INTO page_views (member_id, action) VALUES (1, 'show')");
        let patterns = rule.build_patterns(&analysis);
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].pattern.starts_with(r"\bPageView\.("));
        assert!(patterns[1].optional);
    }

    #[test]
    fn test_columns_raise_confidence() {
        let rule = PersistenceRule::new(0.6);
        let analysis = analyze("INSERT INTO page_views (member_id, action) VALUES (1, 'show')");
        let full = rule.validate_match("PageView.create(member_id: m.id, action: name)", &analysis);
        let bare = rule.validate_match("PageView.create(attrs)", &analysis);
        assert_eq!(full, 0.9);
        assert_eq!(bare, 0.75);
    }

    #[test]
    fn test_reads_have_no_patterns() {
        let rule = PersistenceRule::new(0.6);
        assert!(rule.build_patterns(&analyze("SELECT * FROM users")).is_empty());
    }
}
