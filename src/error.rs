pub use masterror::{AppError, AppResult};
use serde::Serialize;

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create query parse error with optional position info
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Query parse error", &msg))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create project root error
pub fn project_root_error(path: &str) -> AppError {
    AppError::bad_request(format!("Project root not found: {}", path))
}

/// Create search backend error (timeouts, spawn failures, bad exit codes)
pub fn search_backend_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Error-shaped value returned by the tool entry points.
///
/// Tools never propagate failures past their boundary; the caller receives
/// this value instead and decides whether to re-route or retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub error:                 String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion:            Option<String>,
    /// Statements the classifier saw, for routing mismatches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_queries:      Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_reason: Option<String>
}

impl ToolError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error:                 error.into(),
            suggestion:            None,
            detected_queries:      None,
            classification_reason: None
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_classification(mut self, queries: usize, reason: impl Into<String>) -> Self {
        self.detected_queries = Some(queries);
        self.classification_reason = Some(reason.into());
        self
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suggestion {
            Some(suggestion) => write!(f, "{} ({})", self.error, suggestion),
            None => write!(f, "{}", self.error)
        }
    }
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];
    let col_num_start = line_num_start + col_start + col_marker.len();

    let col_end = message[col_num_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(message.len() - col_num_start);
    let col_str = &message[col_num_start..col_num_start + col_end];

    match (line_str.parse(), col_str.parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition { line, column }),
        _ => None
    }
}
