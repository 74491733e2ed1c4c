use colored::Colorize;
use serde::Serialize;

use crate::{
    error::ToolError,
    normalizer::ClassificationResult,
    progressive::MatchType,
    query::{QueryAnalysis, fingerprint},
    tools::{SearchReport, TransactionReport}
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

fn structured<T: Serialize>(value: &T, format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Json => Some(serde_json::to_string_pretty(value).unwrap_or_default()),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value).unwrap_or_default()),
        OutputFormat::Text => None
    }
}

fn header(text: &str, opts: &OutputOptions) -> String {
    if opts.colored {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn confidence_label(confidence: f64, opts: &OutputOptions) -> String {
    let label = format!("{:.2}", confidence);
    if !opts.colored {
        return label;
    }
    if confidence >= 0.8 {
        label.green().to_string()
    } else if confidence >= 0.5 {
        label.yellow().to_string()
    } else {
        label.red().to_string()
    }
}

/// Format a single-query search report
pub fn format_search_report(report: &SearchReport, opts: &OutputOptions) -> String {
    if let Some(out) = structured(report, opts.format) {
        return out;
    }

    let mut output = header("=== SQL Source Search ===\n\n", opts);
    output.push_str(&format!("Fingerprint: {}\n", report.fingerprint));
    let analysis = &report.query_analysis;
    output.push_str(&format!(
        "Intent: {}  Tables: {}  Models: {}\n",
        analysis.intent,
        analysis.tables.join(", "),
        analysis.models.join(", ")
    ));
    if opts.verbose && !analysis.rails_patterns.is_empty() {
        output.push_str("Likely ORM calls:\n");
        for pattern in &analysis.rails_patterns {
            output.push_str(&format!("  {}\n", pattern));
        }
    }
    output.push('\n');

    if report.matches.is_empty() {
        output.push_str("No matches found\n");
    }
    for (i, m) in report.matches.iter().enumerate() {
        let location = format!("{}:{}", m.file, m.line);
        let location = if opts.colored {
            location.cyan().bold().to_string()
        } else {
            location
        };
        output.push_str(&format!(
            "#{} {} [{}] {}\n",
            i + 1,
            location,
            confidence_label(m.confidence, opts),
            match m.match_type {
                MatchType::Definition => "definition",
                MatchType::Usage => "usage"
            }
        ));
        output.push_str(&format!("    {}\n", m.snippet));
        for why in &m.why {
            output.push_str(&format!("    - {}\n", why));
        }
    }

    if let Some(cmd) = &report.verification_command {
        output.push_str(&format!("\nVerify with: {}\n", cmd));
    }
    output
}

/// Format a transaction report
pub fn format_transaction_report(report: &TransactionReport, opts: &OutputOptions) -> String {
    if let Some(out) = structured(report, opts.format) {
        return out;
    }

    let mut output = String::new();
    for line in report.transaction_summary.lines() {
        if line.starts_with("===") {
            output.push_str(&header(line, opts));
        } else {
            output.push_str(line);
        }
        output.push('\n');
    }

    if opts.verbose {
        output.push('\n');
        output.push_str(&header("=== Timeline ===", opts));
        output.push('\n');
        for step in &report.visualization.timeline {
            output.push_str(&format!("{:>3}. {}", step.step, step.operation));
            if let Some(ts) = &step.timestamp {
                output.push_str(&format!("  @ {}", ts));
            }
            if !step.references.is_empty() {
                output.push_str(&format!("  refs: {}", step.references.join(", ")));
            }
            output.push('\n');
        }
    }
    output
}

/// Format a classifier verdict
pub fn format_classification(result: &ClassificationResult, opts: &OutputOptions) -> String {
    if let Some(out) = structured(result, opts.format) {
        return out;
    }
    format!(
        "{}: {} ({} quer{}, {} confidence)\n",
        header("Input", opts),
        result.input_type,
        result.query_count,
        if result.query_count == 1 { "y" } else { "ies" },
        result.confidence
    ) + &format!("Reason: {}\n", result.reason)
}

/// Format one semantic analysis
pub fn format_query_analysis(analysis: &QueryAnalysis, opts: &OutputOptions) -> String {
    if let Some(out) = structured(analysis, opts.format) {
        return out;
    }

    let mut output = header("=== SQL Analysis ===\n\n", opts);
    output.push_str(&format!("Intent: {}\n", analysis.intent));
    output.push_str(&format!("Fingerprint: {}\n", fingerprint(analysis)));

    let tables: Vec<String> = analysis
        .tables
        .iter()
        .map(|t| format!("{} ({})", t.name, t.model))
        .collect();
    output.push_str(&format!("Tables: {}\n", tables.join(", ")));

    if !analysis.where_conditions.is_empty() {
        let cols: Vec<String> = analysis
            .where_conditions
            .iter()
            .map(|c| format!("{} {}", c.column.name, c.operator))
            .collect();
        output.push_str(&format!("WHERE: {}\n", cols.join(", ")));
    }
    if !analysis.order_columns.is_empty() {
        let cols: Vec<&str> = analysis.order_columns.iter().map(|s| s.as_str()).collect();
        output.push_str(&format!("ORDER BY: {}\n", cols.join(", ")));
    }
    if let Some(limit) = analysis.limit {
        output.push_str(&format!("LIMIT: {}\n", limit));
    }
    if let Some(offset) = analysis.offset {
        output.push_str(&format!("OFFSET: {}\n", offset));
    }
    if opts.verbose {
        output.push_str(&format!(
            "Complexity: {:?} (parsed with {:?})\n",
            analysis.complexity, analysis.parsed_with
        ));
    }
    if !analysis.rails_patterns.is_empty() {
        output.push_str("Likely ORM calls:\n");
        for pattern in &analysis.rails_patterns {
            output.push_str(&format!("  {}\n", pattern));
        }
    }
    output
}

/// Format an error-shaped tool result
pub fn format_tool_error(error: &ToolError, opts: &OutputOptions) -> String {
    if let Some(out) = structured(error, opts.format) {
        return out;
    }
    let mut output = if opts.colored {
        format!("{} {}\n", "error:".red().bold(), error.error)
    } else {
        format!("error: {}\n", error.error)
    };
    if let Some(reason) = &error.classification_reason {
        output.push_str(&format!("  reason: {}\n", reason));
    }
    if let Some(suggestion) = &error.suggestion {
        output.push_str(&format!("  suggestion: {}\n", suggestion));
    }
    output
}
