//! Source correlation for a reconstructed transaction.
//!
//! Findings are gathered in a fixed strategy order:
//!
//! 1. `controller_context_verification`: a controller/action pair from SQL
//!    comments that exists on disk as `def action` in the controller file
//! 2. `transaction_wrapper`: `transaction do` blocks naming the columns of
//!    the first INSERT
//! 3. `callback_declaration`: write callbacks on the model behind a cascade
//! 4. `individual_query`: progressive search per significant statement
//!
//! The inferred controller context record itself is never upgraded; a
//! verified controller only adds a separate finding.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{SqlOperation, SqlQuery, TransactionFlow, TransactionPattern};
use crate::{
    inflect::table_to_model,
    progressive::{ProgressiveSearchEngine, RankedMatch},
    query::analyze,
    search::{CodeSearchEngine, WRITE_CALLBACKS}
};

/// Columns filled in by the database or the ORM, never by application code
const GENERIC_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];
/// Lines read after a `transaction do` line
const WRAPPER_CONTEXT_LINES: usize = 30;
/// Matched columns a wrapper block needs, unless the signature is shorter
const WRAPPER_MIN_COLUMNS: usize = 2;

const TRANSACTION_BLOCK: &str = r"transaction\s+do\b";
static INSERT_COLUMNS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)INSERT\s+INTO\s+[`"]?[\w.]+[`"]?\s*\(([^)]+)\)"#).expect("valid regex")
});

/// How a finding was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    ControllerContextVerification,
    TransactionWrapper,
    CallbackDeclaration,
    IndividualQuery
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControllerContextVerification => write!(f, "controller_context_verification"),
            Self::TransactionWrapper => write!(f, "transaction_wrapper"),
            Self::CallbackDeclaration => write!(f, "callback_declaration"),
            Self::IndividualQuery => write!(f, "individual_query")
        }
    }
}

/// One located line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingMatch {
    pub file:       String,
    pub line:       usize,
    pub snippet:    String,
    /// Label such as `verified`, `high (4/5 columns)` or `0.85`
    pub confidence: String,
    pub why:        Vec<String>
}

impl From<RankedMatch> for FindingMatch {
    fn from(m: RankedMatch) -> Self {
        Self {
            file:       m.file,
            line:       m.line,
            snippet:    m.snippet,
            confidence: format!("{:.2}", m.confidence),
            why:        m.why
        }
    }
}

/// Source locations found for one part of the transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFinding {
    /// What was searched for
    pub query:           String,
    pub sql:             String,
    pub strategy:        SearchStrategy,
    pub matches:         Vec<FindingMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp:       Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_columns: Vec<String>
}

/// Every finding for `flow`, strategies in priority order.
///
/// At most `max_patterns` statements go through progressive search, each
/// keeping up to `max_results` matches.
pub async fn find_source_code(
    flow: &TransactionFlow,
    engine: &mut ProgressiveSearchEngine,
    max_patterns: usize,
    max_results: usize
) -> Vec<SourceFinding> {
    let started_at = flow.started_at().map(str::to_string);
    let mut findings = verify_controllers(flow, engine.code_search(), &started_at).await;

    let wrappers = transaction_wrappers(flow, engine.code_search(), max_results, &started_at).await;
    tracing::debug!(found = wrappers.len(), "transaction wrapper search");
    findings.extend(wrappers);

    findings.extend(callback_declarations(flow, engine.code_search()).await);
    findings.extend(individual_queries(flow, engine, max_patterns, max_results).await);
    findings
}

async fn verify_controllers(
    flow: &TransactionFlow,
    search: &mut CodeSearchEngine,
    started_at: &Option<String>
) -> Vec<SourceFinding> {
    let mut findings = Vec::new();
    for pattern in flow.controller_contexts() {
        let TransactionPattern::ControllerContext {
            controller,
            action,
            ..
        } = pattern
        else {
            continue;
        };
        let Some(file) = search.find_controller_file(controller).await else {
            tracing::debug!(controller = %controller, "controller file not found");
            continue;
        };
        let Some(line) = search.find_method_definition(&file, action).await else {
            tracing::debug!(controller = %controller, action = %action, "controller action not found");
            continue;
        };
        findings.push(SourceFinding {
            query:           format!("CONTROLLER ACTION: {}#{}", controller, action),
            sql:             format!(
                "Verified from SQL metadata (controller: {}, action: {})",
                controller, action
            ),
            strategy:        SearchStrategy::ControllerContextVerification,
            matches:         vec![FindingMatch {
                why:        vec![
                    String::from("SQL comment contained controller/action metadata"),
                    format!("Controller file: {}", file),
                    format!("Action method: def {}", action),
                    String::from("Entry point that initiated the transaction"),
                ],
                file,
                line,
                snippet:    format!("def {}", action),
                confidence: String::from("verified")
            }],
            timestamp:       started_at.clone(),
            matched_columns: Vec::new()
        });
    }
    findings
}

/// Columns of an INSERT that application code would name
fn signature_columns(query: &SqlQuery) -> Vec<String> {
    let analysis = analyze(&query.sql);
    let mut columns: Vec<String> = analysis
        .write_columns
        .iter()
        .map(|c| c.to_string())
        .collect();
    if columns.is_empty()
        && let Some(caps) = INSERT_COLUMNS_RE.captures(&query.sql)
        && let Some(list) = caps.get(1)
    {
        columns = list
            .as_str()
            .split(',')
            .map(|c| c.trim().trim_matches(|ch: char| ch == '`' || ch == '"').to_string())
            .collect();
    }
    columns.retain(|c| !c.is_empty() && !GENERIC_COLUMNS.contains(&c.to_lowercase().as_str()));
    columns
}

/// `:col`, `col:` or a quoted `"col"` anywhere in `text`
fn names_column(text: &str, column: &str) -> bool {
    let name = regex::escape(column);
    Regex::new(&format!(r#"(:{name}\b|\b{name}:|['"]{name}['"])"#))
        .is_ok_and(|re| re.is_match(text))
}

/// Signature columns named in a block, `foo_id` also matching `:foo`
fn matched_columns(block: &str, signature: &[String]) -> Vec<String> {
    signature
        .iter()
        .filter(|col| {
            names_column(block, col)
                || col
                    .strip_suffix("_id")
                    .is_some_and(|assoc| !assoc.is_empty() && names_column(block, assoc))
        })
        .cloned()
        .collect()
}

fn wrapper_confidence(matched: usize, total: usize) -> String {
    let level = match matched {
        5.. => "very high",
        3..=4 => "high",
        _ => "medium"
    };
    format!("{} ({}/{} columns)", level, matched, total)
}

async fn transaction_wrappers(
    flow: &TransactionFlow,
    search: &mut CodeSearchEngine,
    max_results: usize,
    started_at: &Option<String>
) -> Vec<SourceFinding> {
    let Some(insert) = flow
        .queries
        .iter()
        .find(|q| q.operation == SqlOperation::Insert && q.table.is_some())
    else {
        return Vec::new();
    };
    let table = insert.table.as_deref().unwrap_or_default();
    let signature = signature_columns(insert);
    if signature.is_empty() {
        return Vec::new();
    }
    let required = WRAPPER_MIN_COLUMNS.min(signature.len());

    let mut blocks = Vec::new();
    for hit in search.search(TRANSACTION_BLOCK, "rb").await {
        let Some(block) = search
            .read_context(&hit.file, hit.line, WRAPPER_CONTEXT_LINES)
            .await
        else {
            continue;
        };
        let matched = matched_columns(&block, &signature);
        if matched.len() >= required {
            blocks.push((hit, matched));
        }
    }
    blocks.sort_by(|(a, ma), (b, mb)| {
        mb.len()
            .cmp(&ma.len())
            .then_with(|| a.file.cmp(&b.file))
            .then(a.line.cmp(&b.line))
    });
    blocks.truncate(max_results);

    blocks
        .into_iter()
        .map(|(hit, matched)| {
            let shown: Vec<&str> = matched.iter().take(5).map(String::as_str).collect();
            SourceFinding {
                query:           format!("TRANSACTION wrapper for {}", table),
                sql:             format!(
                    "ActiveRecord::Base.transaction (wrapping {} queries)",
                    flow.queries.len()
                ),
                strategy:        SearchStrategy::TransactionWrapper,
                matches:         vec![FindingMatch {
                    file:       hit.file,
                    line:       hit.line,
                    snippet:    hit.content,
                    confidence: wrapper_confidence(matched.len(), signature.len()),
                    why:        vec![
                        String::from("Transaction block wrapping table operations"),
                        format!("Table: {}", table),
                        format!("Matched columns: {}", shown.join(", ")),
                        format!("Column signature match: {}/{}", matched.len(), signature.len()),
                    ]
                }],
                timestamp:       started_at.clone(),
                matched_columns: matched
            }
        })
        .collect()
}

async fn callback_declarations(flow: &TransactionFlow, search: &mut CodeSearchEngine) -> Vec<SourceFinding> {
    let mut seen: Vec<&str> = Vec::new();
    let mut findings = Vec::new();
    for pattern in &flow.patterns {
        let TransactionPattern::CascadeInsert {
            sequence,
            ..
        } = pattern
        else {
            continue;
        };
        let [trigger, target] = sequence;
        if seen.contains(&trigger.as_str()) {
            continue;
        }
        seen.push(trigger);

        let model = table_to_model(trigger);
        let Some(file) = search.find_model_file(&model).await else {
            tracing::debug!(model = %model, "model file not found");
            continue;
        };
        let hits = search.find_callbacks(&file, WRITE_CALLBACKS).await;
        if hits.is_empty() {
            continue;
        }
        findings.push(SourceFinding {
            query:           format!("CALLBACKS on {}", model),
            sql:             format!("INSERT into {} followed by INSERT into {}", trigger, target),
            strategy:        SearchStrategy::CallbackDeclaration,
            matches:         hits
                .into_iter()
                .map(|hit| FindingMatch {
                    file:       hit.file,
                    line:       hit.line,
                    snippet:    hit.content,
                    confidence: String::from("medium"),
                    why:        vec![
                        format!("Write callback declared on {}", model),
                        format!("May issue the INSERT into {}", target),
                    ]
                })
                .collect(),
            timestamp:       None,
            matched_columns: Vec::new()
        });
    }
    findings
}

async fn individual_queries(
    flow: &TransactionFlow,
    engine: &mut ProgressiveSearchEngine,
    max_patterns: usize,
    max_results: usize
) -> Vec<SourceFinding> {
    let mut seen: Vec<(SqlOperation, &str)> = Vec::new();
    let mut findings = Vec::new();
    for query in &flow.queries {
        if seen.len() >= max_patterns {
            break;
        }
        let Some(table) = query.table.as_deref() else {
            continue;
        };
        if !query.operation.is_significant() || seen.contains(&(query.operation, table)) {
            continue;
        }
        seen.push((query.operation, table));

        let analysis = analyze(&query.sql);
        let matches = engine.search_progressive(&analysis, max_results).await;
        if matches.is_empty() {
            continue;
        }
        findings.push(SourceFinding {
            query:           format!("{} {}", query.operation, table),
            sql:             query.sql.clone(),
            strategy:        SearchStrategy::IndividualQuery,
            matches:         matches.into_iter().map(FindingMatch::from).collect(),
            timestamp:       query.timestamp.clone(),
            matched_columns: Vec::new()
        });
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_columns_drop_generic() {
        let query = SqlQuery::new(
            "INSERT INTO page_views (id, member_id, referer, created_at, updated_at) VALUES (1, 2, 'x', NOW(), NOW())"
        );
        assert_eq!(signature_columns(&query), vec!["member_id", "referer"]);
    }

    #[test]
    fn test_matched_columns_via_association() {
        let block = "ActiveRecord::Base.transaction do\n  PageView.create!(member: @user, referer: request.referer)\nend";
        let signature = vec![
            String::from("member_id"),
            String::from("referer"),
            String::from("user_agent"),
        ];
        assert_eq!(matched_columns(block, &signature), vec!["member_id", "referer"]);
    }

    #[test]
    fn test_wrapper_confidence_levels() {
        assert_eq!(wrapper_confidence(2, 6), "medium (2/6 columns)");
        assert_eq!(wrapper_confidence(3, 6), "high (3/6 columns)");
        assert_eq!(wrapper_confidence(5, 6), "very high (5/6 columns)");
    }
}
