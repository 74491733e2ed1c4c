use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Keywords that can open a SQL statement
pub const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "MERGE",
    "REPLACE", "BEGIN", "START", "COMMIT", "ROLLBACK", "SET", "SHOW", "DESCRIBE", "EXPLAIN",
    "ANALYZE", "CALL", "EXECUTE", "WITH"
];

/// Words that commonly tag a log line as carrying a statement
pub const COMMON_MARKERS: &[&str] = &["Query", "Execute", "Statement", "SQL", "exec", "run"];

/// Lines inspected when deciding whether input is plain SQL
const PLAIN_SQL_PROBE_LINES: usize = 10;
/// Lines sampled by [`learn_format`]
const FORMAT_SAMPLE_LINES: usize = 50;
/// Timestamps are only looked for this close to the start of a line
const TIMESTAMP_WINDOW: usize = 50;
/// A statement starting further right than this is a new log entry
const NEW_ENTRY_MIN_OFFSET: usize = 10;

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", SQL_KEYWORDS.join("|"))).expect("valid regex")
});
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({})\b", COMMON_MARKERS.join("|"))).expect("valid regex")
});
static TIMESTAMP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{4}[-/]\d{2}[-/]\d{2}",
        r"\d{2}:\d{2}:\d{2}",
        r"\b\d{10,13}\b",
        r"\[\d{2}/\w{3}/\d{4}"
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static TRUNCATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bWHERE\s*$",
        r"(?i)\bAND\s*$",
        r"(?i)\bOR\s*$",
        r"(?i)\bVALUES\s*\(\s*$",
        r"(?i)\bSET\s*$",
        r"(?i)\bFROM\s*$",
        r"(?i)\bJOIN\s*$",
        r",\s*$"
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static BULK_VALUES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bVALUES\s*\(.*\)\s*,\s*\(").expect("valid regex"));
static SUBQUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*SELECT\b").expect("valid regex"));
static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bJOIN\b").expect("valid regex"));
static CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(FROM|WHERE|AND|OR|ORDER|GROUP|HAVING|LIMIT|OFFSET|JOIN|LEFT|RIGHT|INNER|OUTER|ON|VALUES|SET|UNION|RETURNING|\)|,)"
    )
    .expect("valid regex")
});

/// Statement kind by leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum SqlType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Merge,
    Replace,
    Set,
    Show,
    Describe,
    Explain,
    Call,
    With,
    Begin,
    Commit,
    Rollback,
    /// A merged `BEGIN ... COMMIT` span
    Transaction,
    Unknown
}

impl SqlType {
    /// Classify by the first word of `sql`
    pub fn from_sql(sql: &str) -> Self {
        let upper = sql.trim_start().to_uppercase();
        let mut words = upper.split(|c: char| c.is_whitespace() || c == ';' || c == '(');
        match words.next().unwrap_or_default() {
            "SELECT" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "CREATE" => Self::Create,
            "ALTER" => Self::Alter,
            "DROP" => Self::Drop,
            "TRUNCATE" => Self::Truncate,
            "MERGE" => Self::Merge,
            "REPLACE" => Self::Replace,
            "SET" => Self::Set,
            "SHOW" => Self::Show,
            "DESCRIBE" => Self::Describe,
            "EXPLAIN" | "ANALYZE" => Self::Explain,
            "CALL" | "EXECUTE" => Self::Call,
            "WITH" => Self::With,
            "BEGIN" => Self::Begin,
            "START" if words.find(|w| !w.is_empty()) == Some("TRANSACTION") => Self::Begin,
            "COMMIT" => Self::Commit,
            "ROLLBACK" => Self::Rollback,
            _ => Self::Unknown
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Merge => "MERGE",
            Self::Replace => "REPLACE",
            Self::Set => "SET",
            Self::Show => "SHOW",
            Self::Describe => "DESCRIBE",
            Self::Explain => "EXPLAIN",
            Self::Call => "CALL",
            Self::With => "WITH",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Transaction => "TRANSACTION",
            Self::Unknown => "UNKNOWN"
        };
        write!(f, "{}", name)
    }
}

/// How far an extracted statement can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionConfidence {
    High,
    Medium,
    Low,
    NeedsReview
}

/// One statement pulled out of the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedSql {
    pub sql:              String,
    pub sql_type:         SqlType,
    pub confidence:       ExtractionConfidence,
    /// 1-based, inclusive
    pub start_line:       usize,
    pub end_line:         usize,
    pub warnings:         Vec<String>,
    pub truncated:        bool,
    /// Log prefix stripped from the first line
    pub metadata_removed: Option<String>,
    pub notes:            Vec<String>
}

/// Shape of the log lines, learned from a sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFormat {
    /// Markers seen in statement prefixes
    pub markers:             Vec<String>,
    pub avg_prefix_len:      usize,
    /// Most common indentation of continuation lines
    pub continuation_indent: usize,
    pub plain_sql:           bool
}

/// Raw segment before validation and transaction merging
#[derive(Debug)]
struct Segment {
    text:   String,
    start:  usize,
    end:    usize,
    prefix: Option<String>
}

/// Extract every SQL statement from `text`.
///
/// ```
/// use sql_source_tracer::normalizer::{SqlType, extract};
///
/// let log = "2024-01-01T10:00:00.000Z 12 Query SELECT * FROM users WHERE id = 1;";
/// let statements = extract(log);
/// assert_eq!(statements.len(), 1);
/// assert_eq!(statements[0].sql_type, SqlType::Select);
/// assert_eq!(statements[0].sql, "SELECT * FROM users WHERE id = 1;");
/// ```
pub fn extract(text: &str) -> Vec<ExtractedSql> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = text.lines().collect();
    let format = learn_format(&lines);
    let segments = if format.plain_sql {
        split_plain(text)
    } else {
        segment_log(&lines, &format)
    };
    tracing::debug!(
        segments = segments.len(),
        plain_sql = format.plain_sql,
        "segmented input"
    );
    merge_transactions(segments)
}

/// Sample the first lines and learn prefixes, markers and indentation
pub fn learn_format(lines: &[&str]) -> LogFormat {
    let mut format = LogFormat {
        plain_sql: is_plain_sql(lines),
        ..LogFormat::default()
    };
    let mut prefix_total = 0;
    let mut prefix_count = 0;
    let mut indents: Vec<usize> = Vec::new();

    for line in lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .take(FORMAT_SAMPLE_LINES)
    {
        match find_sql_start(line) {
            Some(pos) => {
                let prefix = &line[..pos];
                prefix_total += prefix.trim_end().len();
                prefix_count += 1;
                for m in MARKER_RE.find_iter(prefix) {
                    if !format.markers.iter().any(|k| k == m.as_str()) {
                        format.markers.push(m.as_str().to_string());
                    }
                }
            }
            None => {
                let indent = leading_whitespace(line);
                if indent > 0 {
                    indents.push(indent);
                }
            }
        }
    }
    if prefix_count > 0 {
        format.avg_prefix_len = prefix_total / prefix_count;
    }
    format.continuation_indent = most_common(&indents).unwrap_or(0);
    format
}

fn most_common(values: &[usize]) -> Option<usize> {
    let mut counts: std::collections::BTreeMap<usize, usize> = std::collections::BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(v, _)| v)
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn has_timestamp(line: &str) -> bool {
    let window = match line.char_indices().nth(TIMESTAMP_WINDOW) {
        Some((idx, _)) => &line[..idx],
        None => line
    };
    TIMESTAMP_RES.iter().any(|re| re.is_match(window))
}

fn is_plain_sql(lines: &[&str]) -> bool {
    let probe: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .take(PLAIN_SQL_PROBE_LINES)
        .collect();
    if probe.is_empty() {
        return false;
    }
    let starts_with_sql = probe.iter().any(|l| find_sql_start(l.trim_start()) == Some(0));
    let has_log_noise = probe
        .iter()
        .any(|l| has_timestamp(l) || MARKER_RE.is_match(l));
    starts_with_sql && !has_log_noise
}

/// Byte offset where the SQL begins on `line`.
///
/// Past the indentation only upper-case keywords count, so prose such as
/// `UsersController#show` is not mistaken for a statement. A marker word
/// that doubles as a keyword (`Execute`) is skipped when a real statement
/// follows it.
fn find_sql_start(line: &str) -> Option<usize> {
    let indent = leading_whitespace(line);
    let mut hits = KEYWORD_RE
        .find_iter(line)
        .filter(|m| m.start() == indent || m.as_str().chars().all(|c| c.is_ascii_uppercase()))
        .peekable();
    while let Some(hit) = hits.next() {
        let is_marker = COMMON_MARKERS.contains(&hit.as_str());
        if is_marker && hits.peek().is_some() {
            continue;
        }
        return Some(hit.start());
    }
    None
}

/// Whether an unprefixed line reads as the middle of a statement
fn continues_statement(line: &str, open: &Segment) -> bool {
    leading_whitespace(line) > 0
        || CONTINUATION_RE.is_match(line)
        || balanced(&open.text) != (true, true)
}

fn looks_like_new_entry(line: &str, sql_pos: Option<usize>, format: &LogFormat) -> bool {
    let has_marker = if format.markers.is_empty() {
        MARKER_RE.is_match(line)
    } else {
        format.markers.iter().any(|m| line.contains(m.as_str()))
    };
    has_marker || has_timestamp(line) || sql_pos.is_some_and(|p| p > NEW_ENTRY_MIN_OFFSET)
}

fn segment_log(lines: &[&str], format: &LogFormat) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<Segment> = None;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let sql_pos = find_sql_start(line);
        let new_entry = looks_like_new_entry(line, sql_pos, format);

        match sql_pos {
            Some(pos) if new_entry || current.is_none() => {
                segments.extend(current.take());
                let prefix = line[..pos].trim();
                current = Some(Segment {
                    text:   line[pos..].trim().to_string(),
                    start:  line_no,
                    end:    line_no,
                    prefix: (!prefix.is_empty()).then(|| prefix.to_string())
                });
            }
            _ if new_entry => {
                // log entry without SQL closes whatever was open
                segments.extend(current.take());
            }
            _ => match current.as_mut() {
                Some(seg) if continues_statement(line, seg) => {
                    seg.text.push('\n');
                    seg.text.push_str(line.trim());
                    seg.end = line_no;
                }
                _ => segments.extend(current.take())
            }
        }
    }
    segments.extend(current);
    segments
}

/// Split plain SQL on `;` outside quotes, keeping the terminator
fn split_plain(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut line = 1;
    let mut start = None;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        if ch == '\n' {
            line += 1;
        }
        if start.is_none() && !ch.is_whitespace() {
            start = Some(line);
        }
        buf.push(ch);
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, ';') => {
                if let Some(s) = start.take() {
                    segments.push(Segment {
                        text:   buf.trim().to_string(),
                        start:  s,
                        end:    line,
                        prefix: None
                    });
                }
                buf.clear();
            }
            _ => {}
        }
    }
    if let Some(s) = start
        && !buf.trim().is_empty()
    {
        let end = s + buf.trim().lines().count().saturating_sub(1);
        segments.push(Segment {
            text:   buf.trim().to_string(),
            start:  s,
            end,
            prefix: None
        });
    }
    segments
}

fn is_procedural_begin(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    let mut words = upper.split_whitespace();
    words.next();
    matches!(
        words.next(),
        Some("DECLARE" | "IF" | "WHILE" | "FOR" | "LOOP" | "CASE")
    )
}

fn append(tx: &mut Segment, seg: Segment) {
    tx.text.push('\n');
    tx.text.push_str(&seg.text);
    tx.end = seg.end;
}

fn merge_transactions(segments: Vec<Segment>) -> Vec<ExtractedSql> {
    let mut out = Vec::new();
    let mut open: Option<Segment> = None;

    for seg in segments {
        let kind = SqlType::from_sql(&seg.text);
        match kind {
            SqlType::Begin if open.is_none() && !is_procedural_begin(&seg.text) => {
                open = Some(seg);
            }
            SqlType::Commit | SqlType::Rollback if open.is_some() => {
                if let Some(mut tx) = open.take() {
                    append(&mut tx, seg);
                    out.push(finalize(tx, SqlType::Transaction));
                }
            }
            _ => match open.as_mut() {
                Some(tx) => append(tx, seg),
                None => out.push(finalize(seg, kind))
            }
        }
    }
    if let Some(tx) = open {
        let mut stmt = finalize(tx, SqlType::Transaction);
        stmt.warnings
            .push(String::from("Transaction not terminated (missing COMMIT/ROLLBACK)"));
        stmt.confidence = ExtractionConfidence::NeedsReview;
        out.push(stmt);
    }
    out
}

fn finalize(seg: Segment, sql_type: SqlType) -> ExtractedSql {
    let confidence = if sql_type == SqlType::Unknown {
        ExtractionConfidence::Low
    } else {
        ExtractionConfidence::Medium
    };
    let mut stmt = ExtractedSql {
        sql:              seg.text,
        sql_type,
        confidence,
        start_line:       seg.start,
        end_line:         seg.end,
        warnings:         Vec::new(),
        truncated:        false,
        metadata_removed: seg.prefix,
        notes:            Vec::new()
    };
    validate(&mut stmt);
    annotate(&mut stmt);
    stmt
}

fn balanced(sql: &str) -> (bool, bool) {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            _ => {}
        }
    }
    (depth == 0, quote.is_none())
}

fn validate(stmt: &mut ExtractedSql) {
    let trimmed = stmt.sql.trim_end();
    let (parens_ok, quotes_ok) = balanced(trimmed);
    let dangling = !trimmed.ends_with(';') && TRUNCATION_RES.iter().any(|re| re.is_match(trimmed));

    if !parens_ok {
        stmt.warnings.push(String::from("Unbalanced parentheses"));
    }
    if !quotes_ok {
        stmt.warnings.push(String::from("Unbalanced quotes"));
    }
    if dangling || !parens_ok || !quotes_ok {
        stmt.truncated = true;
        stmt.warnings
            .push(String::from("SQL may be truncated or incomplete"));
    }
    if stmt.warnings.is_empty() {
        if stmt.confidence == ExtractionConfidence::Medium {
            stmt.confidence = ExtractionConfidence::High;
        }
    } else {
        stmt.confidence = ExtractionConfidence::NeedsReview;
    }
}

fn annotate(stmt: &mut ExtractedSql) {
    if SUBQUERY_RE.is_match(&stmt.sql) {
        stmt.notes.push(String::from("Contains subquery"));
    }
    if JOIN_RE.is_match(&stmt.sql) {
        stmt.notes.push(String::from("Contains JOIN operations"));
    }
    if stmt.sql_type == SqlType::Insert && BULK_VALUES_RE.is_match(&stmt.sql) {
        stmt.notes.push(String::from("Bulk INSERT detected"));
    }
}

/// Split a merged transaction back into its statements.
///
/// Statements are separated by `;` outside quotes, or by a line that opens
/// with a statement keyword.
pub fn split_transaction(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    for seg in split_plain(sql) {
        let mut current = String::new();
        for line in seg.text.lines() {
            let opens = find_sql_start(line.trim_start()) == Some(0)
                && !matches!(SqlType::from_sql(line), SqlType::Unknown | SqlType::Set)
                && !current.is_empty()
                && balanced(&current) == (true, true);
            if opens {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line.trim());
        }
        if !current.trim().is_empty() {
            out.push(current);
        }
    }
    out.into_iter()
        .map(|s| s.trim().trim_end_matches(';').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_sql_split_respects_quotes() {
        let stmts = extract("SELECT 'a;b' FROM t;\nDELETE FROM t WHERE id = 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].sql, "SELECT 'a;b' FROM t;");
        assert_eq!(stmts[1].start_line, 2);
        assert_eq!(stmts[1].sql_type, SqlType::Delete);
    }

    #[test]
    fn test_execute_marker_is_not_statement_start() {
        let line = "2024-01-01 10:00:00 7 Execute SELECT 1";
        assert_eq!(find_sql_start(line), line.find("SELECT"));
    }

    #[test]
    fn test_truncated_statement_flagged() {
        let stmts = extract("SELECT * FROM users WHERE");
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].truncated);
        assert_eq!(stmts[0].confidence, ExtractionConfidence::NeedsReview);
        assert!(
            stmts[0]
                .warnings
                .contains(&String::from("SQL may be truncated or incomplete"))
        );
    }

    #[test]
    fn test_begin_commit_merged() {
        let stmts = extract("BEGIN;\nINSERT INTO a (x) VALUES (1);\nCOMMIT;");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].sql_type, SqlType::Transaction);
        assert_eq!(stmts[0].start_line, 1);
        assert_eq!(stmts[0].end_line, 3);
        assert_eq!(split_transaction(&stmts[0].sql).len(), 3);
    }

    #[test]
    fn test_log_continuation_lines() {
        let log = "2024-01-01T10:00:00.000Z 12 Query SELECT *\n    FROM users\n    WHERE id = 1";
        let stmts = extract(log);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].sql, "SELECT *\nFROM users\nWHERE id = 1");
        assert_eq!(stmts[0].end_line, 3);
        assert!(stmts[0].metadata_removed.as_deref().is_some_and(|p| p.contains("Query")));
    }

    #[test]
    fn test_bulk_insert_note() {
        let stmts = extract("INSERT INTO t (a) VALUES (1), (2);");
        assert!(stmts[0].notes.contains(&String::from("Bulk INSERT detected")));
    }
}
