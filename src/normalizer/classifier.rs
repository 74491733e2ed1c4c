use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::extractor::{SqlType, extract, split_transaction};

/// Timestamped lines needed before input is treated as a transaction log
pub const MIN_TIMESTAMPED_LINES: usize = 3;
/// Statement-looking lines needed for the low-confidence transaction guess
pub const MIN_HEURISTIC_QUERIES: usize = 3;

static TIMESTAMPED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").expect("valid regex")
});
static QUERY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE)\b").expect("valid regex")
});
static BEGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(BEGIN|START\s+TRANSACTION)\b").expect("valid regex"));
static COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(COMMIT|ROLLBACK)\b").expect("valid regex"));

/// What kind of input the caller handed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Single,
    Transaction,
    Empty,
    Unrecognized
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Transaction => write!(f, "transaction"),
            Self::Empty => write!(f, "empty"),
            Self::Unrecognized => write!(f, "unrecognized")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low")
        }
    }
}

/// Verdict of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub input_type:  InputType,
    pub query_count: usize,
    pub confidence:  Confidence,
    pub reason:      String
}

impl ClassificationResult {
    fn new(input_type: InputType, query_count: usize, confidence: Confidence, reason: String) -> Self {
        Self {
            input_type,
            query_count,
            confidence,
            reason
        }
    }

    pub fn is_single_query(&self) -> bool {
        self.input_type == InputType::Single
    }

    pub fn is_transaction(&self) -> bool {
        self.input_type == InputType::Transaction
    }

    /// Whether the input belongs to the transaction tool
    pub fn should_use_transaction_analyzer(&self) -> bool {
        self.is_transaction()
    }
}

/// Decide whether `text` is one query, a transaction log, empty or noise.
///
/// Never fails.
///
/// ```
/// use sql_source_tracer::normalizer::{InputType, classify};
///
/// assert_eq!(classify("   ").input_type, InputType::Empty);
/// assert_eq!(classify("SELECT * FROM users").input_type, InputType::Single);
/// assert_eq!(
///     classify("SELECT 1;\nSELECT 2;").input_type,
///     InputType::Transaction
/// );
/// ```
pub fn classify(text: &str) -> ClassificationResult {
    use Confidence::*;
    use InputType::*;

    if text.trim().is_empty() {
        return ClassificationResult::new(Empty, 0, High, String::from("Empty input"));
    }

    let statements = extract(text);
    let timestamped = text
        .lines()
        .filter(|l| TIMESTAMPED_LINE_RE.is_match(l))
        .count();

    if let Some(tx) = statements
        .iter()
        .find(|s| s.sql_type == SqlType::Transaction)
    {
        let inner = split_transaction(&tx.sql).len();
        let count = statements.len() - 1 + inner;
        return ClassificationResult::new(
            Transaction,
            count,
            High,
            String::from("Transaction block detected (BEGIN...COMMIT)")
        );
    }
    if statements.len() > 1 {
        return ClassificationResult::new(
            Transaction,
            statements.len(),
            High,
            format!("Multiple SQL statements detected ({} queries)", statements.len())
        );
    }
    if timestamped >= MIN_TIMESTAMPED_LINES {
        return ClassificationResult::new(
            Transaction,
            statements.len().max(1),
            Medium,
            format!("Timestamped log format detected ({} lines)", timestamped)
        );
    }
    if statements.len() == 1 {
        return ClassificationResult::new(
            Single,
            1,
            High,
            String::from("Single SQL statement detected")
        );
    }

    tracing::debug!("extraction found no statements, falling back to line heuristics");
    let query_lines = text.lines().filter(|l| QUERY_LINE_RE.is_match(l)).count();
    if BEGIN_RE.is_match(text) && COMMIT_RE.is_match(text) && query_lines >= 2 {
        return ClassificationResult::new(
            Transaction,
            query_lines,
            Medium,
            String::from("BEGIN/COMMIT markers with multiple queries")
        );
    }
    match query_lines {
        n if n >= MIN_HEURISTIC_QUERIES => ClassificationResult::new(
            Transaction,
            n,
            Low,
            format!("{} query-like lines found", n)
        ),
        1 => ClassificationResult::new(
            Single,
            1,
            Medium,
            String::from("One query-like line found")
        ),
        n => ClassificationResult::new(
            Unrecognized,
            n,
            Low,
            String::from("No SQL statements recognized")
        )
    }
}
