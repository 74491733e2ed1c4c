//! How much of a statement's clause structure a code snippet accounts for.

use serde::Serialize;

use super::types::QueryAnalysis;
use crate::config::Thresholds;

const WHERE_WEIGHT: f64 = 0.5;
const ORDER_WEIGHT: f64 = 0.2;
const LIMIT_WEIGHT: f64 = 0.15;
const OFFSET_WEIGHT: f64 = 0.15;

const ORDER_MARKERS: &[&str] = &[".order(", ".order "];
const LIMIT_MARKERS: &[&str] = &[".limit(", ".take(", ".first", ".last"];
const OFFSET_MARKERS: &[&str] = &[".offset("];

/// Confidence band for a completeness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletenessLabel {
    High,
    Medium,
    Partial,
    Low
}

impl CompletenessLabel {
    pub fn from_score(score: f64, thresholds: &Thresholds) -> Self {
        if score >= thresholds.high_band {
            Self::High
        } else if score >= thresholds.medium_band {
            Self::Medium
        } else if score >= thresholds.partial_band {
            Self::Partial
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for CompletenessLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Partial => write!(f, "partial"),
            Self::Low => write!(f, "low")
        }
    }
}

/// Clause coverage of one snippet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completeness {
    pub score:           f64,
    pub confidence:      CompletenessLabel,
    pub matched_clauses: Vec<String>,
    pub missing_clauses: Vec<String>
}

/// Score `snippet` against the clauses of `analysis`.
///
/// WHERE conditions weigh 0.5, ORDER BY 0.2, LIMIT and OFFSET 0.15 each. A
/// clause the SQL does not have contributes its full weight, so a bare
/// `SELECT * FROM t` is fully accounted for by any snippet.
pub fn match_completeness(
    analysis: &QueryAnalysis,
    snippet: &str,
    thresholds: &Thresholds
) -> Completeness {
    let code = snippet.to_lowercase();
    let raw = analysis.raw_sql.to_lowercase();
    let mut score = 0.0;
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    let total = analysis.where_conditions.len();
    if total == 0 {
        score += WHERE_WEIGHT;
    } else {
        let mut found = 0;
        for cond in &analysis.where_conditions {
            let col = cond.column.name.to_lowercase();
            if code.contains(col.as_str())
                || code.contains(&format!(":{}", col))
                || code.contains(&format!("{}:", col))
            {
                found += 1;
                matched.push(format!("WHERE {}", cond.column.name));
            }
        }
        score += WHERE_WEIGHT * found as f64 / total as f64;
        if found < total {
            missing.push(format!("{} WHERE condition(s)", total - found));
        }
    }

    let sql_has_limit = analysis.has_limit || raw.contains("limit");
    let sql_has_offset = analysis.has_offset || raw.contains("offset");
    let clauses = [
        (analysis.has_order, ORDER_WEIGHT, ORDER_MARKERS, "ORDER BY"),
        (sql_has_limit, LIMIT_WEIGHT, LIMIT_MARKERS, "LIMIT"),
        (sql_has_offset, OFFSET_WEIGHT, OFFSET_MARKERS, "OFFSET")
    ];
    for (in_sql, weight, markers, label) in clauses {
        if !in_sql {
            score += weight;
        } else if markers.iter().any(|m| code.contains(m)) {
            score += weight;
            matched.push(label.to_string());
        } else {
            missing.push(label.to_string());
        }
    }

    let score = (score * 100.0).round() / 100.0;
    Completeness {
        score,
        confidence:      CompletenessLabel::from_score(score, thresholds),
        matched_clauses: matched,
        missing_clauses: missing
    }
}
