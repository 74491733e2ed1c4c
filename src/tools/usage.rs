//! Where a relation assigned to an instance variable is executed.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    progressive::{MatchType, RankedMatch},
    search::{CodeHit, CodeSearchEngine}
};

/// Enumerating a relation in a view runs its SELECT
pub const EXECUTION_SITE_CONFIDENCE: f64 = 0.5;
pub const REFERENCE_CONFIDENCE: f64 = 0.3;
/// Plain references reported per instance variable
const MAX_REFERENCES: usize = 3;
const VIEW_EXT: &str = "erb";

static IVAR_ASSIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(@\w+)\s*=[^=~]").expect("valid regex"));

fn usage(hit: CodeHit, confidence: f64, why: [&str; 2]) -> RankedMatch {
    RankedMatch {
        file:         hit.file,
        line:         hit.line,
        snippet:      hit.content,
        confidence,
        why:          why.iter().map(|w| w.to_string()).collect(),
        match_type:   MatchType::Usage,
        rule:         None,
        completeness: None,
        priority:     u8::MAX
    }
}

/// View lines that use the instance variables assigned by `definitions`
pub async fn find_usage_sites(
    search: &mut CodeSearchEngine,
    definitions: &[RankedMatch]
) -> Vec<RankedMatch> {
    let mut ivars: Vec<&str> = Vec::new();
    for def in definitions {
        if let Some(ivar) = IVAR_ASSIGN_RE
            .captures(&def.snippet)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            && !ivars.contains(&ivar)
        {
            ivars.push(ivar);
        }
    }

    let mut usages = Vec::new();
    for ivar in ivars {
        let name = regex::escape(ivar);
        for hit in search.search(&format!(r"{}\.each\b", name), VIEW_EXT).await {
            usages.push(usage(
                hit,
                EXECUTION_SITE_CONFIDENCE,
                ["enumerates the relation (executes SELECT)", "medium (execution site)"]
            ));
        }
        let references = search
            .search(&format!(r"{}\b", name), VIEW_EXT)
            .await
            .into_iter()
            .filter(|hit| !hit.content.contains("each"))
            .take(MAX_REFERENCES);
        for hit in references {
            usages.push(usage(
                hit,
                REFERENCE_CONFIDENCE,
                ["references the query result", "low (reference)"]
            ));
        }
    }
    tracing::debug!(found = usages.len(), "usage sites");
    usages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ivar_assignment() {
        let caps = IVAR_ASSIGN_RE.captures("@members = Member.where(company_id: id).limit(10)");
        assert_eq!(caps.and_then(|c| c.get(1)).map(|m| m.as_str()), Some("@members"));
        assert!(IVAR_ASSIGN_RE.captures("if @members == other").is_none());
    }
}
