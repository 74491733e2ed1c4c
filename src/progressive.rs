//! Progressive search: rules to patterns to ranked source matches.
//!
//! # Stages
//!
//! ```text
//! ┌───────────────┐  applicable   ┌──────────┐  rank by          ┌────────┐
//! │ QueryAnalysis │──────────────▶│ patterns │──distinctiveness─▶│ anchor │
//! └───────────────┘    rules      └──────────┘                   └────────┘
//!                                                                     │ search
//!                                                                     ▼
//! ┌──────────────┐  dedup (file, line)  ┌────────────────┐  file-level AND of
//! │ RankedMatch  │◀──sort, truncate─────│ validate_match │◀─required patterns
//! └──────────────┘                      └────────────────┘
//! ```
//!
//! The most selective required pattern is searched first, which bounds the
//! candidate set. The other required patterns only need to occur somewhere
//! in the same file, since clauses of one relation are often spread over
//! several lines.

use std::cmp::Ordering;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::{
    config::Thresholds,
    query::{Completeness, QueryAnalysis, match_completeness},
    rules::{RuleSet, SearchPattern, SearchRule},
    search::{CodeHit, CodeSearchEngine, FilePattern}
};

/// Whether a match defines the relation or merely uses it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Definition,
    Usage
}

/// A scored source location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub file:         String,
    pub line:         usize,
    pub snippet:      String,
    /// In `[0, 1]`; never `0` for a surfaced match
    pub confidence:   f64,
    pub why:          Vec<String>,
    pub match_type:   MatchType,
    /// Rule that gave the highest confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule:         Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    #[serde(skip)]
    pub priority:     u8
}

/// Pattern plus the rule that produced it
struct Candidate<'r> {
    pattern: SearchPattern,
    rule:    &'r dyn SearchRule,
    regex:   Option<Regex>
}

/// Orchestrates rule selection, staged search and scoring
pub struct ProgressiveSearchEngine {
    search:     CodeSearchEngine,
    rules:      RuleSet,
    thresholds: Thresholds
}

impl ProgressiveSearchEngine {
    pub fn new(search: CodeSearchEngine, thresholds: Thresholds) -> Self {
        Self {
            search,
            rules: RuleSet::new(&thresholds),
            thresholds
        }
    }

    /// Replace the rule set
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn code_search(&mut self) -> &mut CodeSearchEngine {
        &mut self.search
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Ranked source matches for one analyzed statement
    pub async fn search_progressive(
        &mut self,
        analysis: &QueryAnalysis,
        max_results: usize
    ) -> Vec<RankedMatch> {
        let rules = self.rules.applicable(analysis);
        if rules.is_empty() {
            tracing::debug!(intent = %analysis.intent, "no applicable rules");
            return Vec::new();
        }

        let mut candidates: Vec<Candidate<'_>> = rules
            .iter()
            .flat_map(|rule| {
                rule.build_patterns(analysis)
                    .into_iter()
                    .map(move |pattern| Candidate {
                        regex: RegexBuilder::new(&pattern.pattern)
                            .case_insensitive(true)
                            .build()
                            .ok(),
                        pattern,
                        rule: *rule
                    })
            })
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        candidates.sort_by(|a, b| {
            b.pattern
                .distinctiveness
                .partial_cmp(&a.pattern.distinctiveness)
                .unwrap_or(Ordering::Equal)
        });

        let anchor_idx = candidates
            .iter()
            .position(|c| !c.pattern.optional)
            .unwrap_or(0);
        let anchor = &candidates[anchor_idx];
        let file_ext = anchor
            .rule
            .search_locations()
            .first()
            .map(|l| l.extension())
            .unwrap_or("rb");

        let mut others: Vec<FilePattern> = Vec::new();
        for (idx, c) in candidates.iter().enumerate() {
            if idx == anchor_idx
                || c.pattern.pattern == anchor.pattern.pattern
                || others.iter().any(|o| o.pattern == c.pattern.pattern)
            {
                continue;
            }
            others.push(if c.pattern.optional {
                FilePattern::optional(c.pattern.pattern.clone())
            } else {
                FilePattern::required(c.pattern.pattern.clone())
            });
        }
        tracing::debug!(
            anchor = %anchor.pattern.pattern,
            distinctiveness = anchor.pattern.distinctiveness,
            secondary = others.len(),
            "progressive search"
        );

        let hits = self
            .search
            .search_file_level_filter(&anchor.pattern.pattern, &others, file_ext)
            .await;

        let mut best: IndexMap<(String, usize), RankedMatch> = IndexMap::new();
        for hit in hits {
            let Some(ranked) = self.score(hit, analysis, &rules, &candidates) else {
                continue;
            };
            let key = (ranked.file.clone(), ranked.line);
            match best.get(&key) {
                Some(existing) if existing.confidence >= ranked.confidence => {}
                _ => {
                    best.insert(key, ranked);
                }
            }
        }

        let mut results: Vec<RankedMatch> = best.into_values().collect();
        sort_matches(&mut results);
        results.truncate(max_results);
        results
    }

    fn score(
        &self,
        hit: CodeHit,
        analysis: &QueryAnalysis,
        rules: &[&dyn SearchRule],
        candidates: &[Candidate<'_>]
    ) -> Option<RankedMatch> {
        let (rule, confidence) = rules
            .iter()
            .map(|r| (r.info().id, r.validate_match(&hit.content, analysis)))
            .fold(None, |acc: Option<(&'static str, f64)>, (id, score)| match acc {
                Some((_, best)) if best >= score => acc,
                _ => Some((id, score))
            })?;
        if confidence <= 0.0 {
            return None;
        }

        let matched: Vec<String> = candidates
            .iter()
            .filter(|c| c.regex.as_ref().is_some_and(|re| re.is_match(&hit.content)))
            .map(|c| c.pattern.clause_type.to_string())
            .fold(Vec::new(), |mut acc, clause| {
                if !acc.contains(&clause) {
                    acc.push(clause);
                }
                acc
            });
        let completeness = match_completeness(analysis, &hit.content, &self.thresholds);
        let mut why = vec![format!(
            "Matched {} pattern(s): {}",
            matched.len(),
            matched.join(", ")
        )];
        if completeness.missing_clauses.is_empty() {
            why.push(String::from("All SQL clauses accounted for"));
        } else {
            why.push(format!("Missing: {}", completeness.missing_clauses.join(", ")));
        }

        let priority = rules
            .iter()
            .flat_map(|r| r.search_locations())
            .filter(|l| l.contains(&hit.file))
            .map(|l| l.priority)
            .min()
            .unwrap_or(u8::MAX);

        Some(RankedMatch {
            file:         hit.file,
            line:         hit.line,
            snippet:      hit.content,
            confidence,
            why,
            match_type:   MatchType::Definition,
            rule:         Some(rule),
            completeness: Some(completeness),
            priority
        })
    }
}

/// Confidence descending, then location priority, then position
pub fn sort_matches(matches: &mut [RankedMatch]) {
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(a.priority.cmp(&b.priority))
            .then_with(|| a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
    });
}
