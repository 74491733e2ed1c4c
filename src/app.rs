//! Application logic for the SQL Source Tracer CLI.
//!
//! This module contains the command logic separated from the main entry
//! point to enable testing. Every command produces a [`CommandOutput`];
//! only infrastructure failures (unreadable input, bad configuration, a
//! project root that does not exist) come back as `Err`.

use std::{
    fs::read_to_string,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::{Backend, Cli, Commands, CommonArgs, Format},
    config::{BackendKind, Config},
    error::{AppResult, ToolError, config_error, file_read_error, project_root_error},
    normalizer::{classify, extract},
    output::{
        OutputFormat, OutputOptions, format_classification, format_query_analysis,
        format_search_report, format_tool_error, format_transaction_report
    },
    query::analyze,
    tools::{SearchInput, SourceTracer, TransactionInput}
};

/// A result was produced
pub const EXIT_OK: i32 = 0;
/// The tool returned an error-shaped value
pub const EXIT_TOOL_ERROR: i32 = 2;

/// Rendered outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output:    String
}

impl CommandOutput {
    fn ok(output: String) -> Self {
        Self {
            exit_code: EXIT_OK,
            output
        }
    }

    fn tool_error(error: &ToolError, opts: &OutputOptions) -> Self {
        Self {
            exit_code: EXIT_TOOL_ERROR,
            output:    format_tool_error(error, opts)
        }
    }
}

/// Convert CLI format to internal OutputFormat
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

/// Convert CLI backend to the configured backend kind
pub fn convert_backend(backend: Backend) -> BackendKind {
    match backend {
        Backend::Ripgrep => BackendKind::Ripgrep,
        Backend::Walk => BackendKind::Walk
    }
}

/// Create output options from the common flags
pub fn create_output_options(common: &CommonArgs) -> OutputOptions {
    OutputOptions {
        format:  convert_format(common.output_format),
        colored: !common.no_color,
        verbose: common.verbose
    }
}

/// Read input from file or stdin (`-`)
pub fn read_input(path: &Path) -> AppResult<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))
    }
}

/// Inline `--sql` text, or the contents of `--input`
pub fn sql_input(sql: Option<String>, input: Option<&Path>) -> AppResult<String> {
    match (sql, input) {
        (Some(sql), _) => Ok(sql),
        (None, Some(path)) => read_input(path),
        (None, None) => Err(config_error("Either --sql or --input is required"))
    }
}

/// Apply a `--root` override, rejecting roots that are not directories
pub fn resolve_root(root: Option<PathBuf>, config: &mut Config) -> AppResult<()> {
    if let Some(root) = root {
        config.project_root = Some(root);
    }
    if let Some(root) = &config.project_root
        && !root.is_dir()
    {
        return Err(project_root_error(&root.display().to_string()));
    }
    Ok(())
}

fn spinner(message: &'static str, opts: &OutputOptions) -> Option<ProgressBar> {
    if opts.verbose || !matches!(opts.format, OutputFormat::Text) {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Run a parsed command line against a loaded configuration
pub async fn run_command(cli: Cli, mut config: Config) -> AppResult<CommandOutput> {
    let opts = create_output_options(&cli.common);
    if let Some(backend) = cli.common.backend {
        config.search.backend = convert_backend(backend);
    }

    match cli.command {
        Commands::Search {
            root,
            sql,
            input,
            max_results,
            usage_sites
        } => {
            resolve_root(root, &mut config)?;
            let sql = sql_input(sql, input.as_deref())?;
            let mut tracer = SourceTracer::new(&config);
            let request = SearchInput {
                sql,
                max_results,
                include_usage_sites: usage_sites
            };

            let pb = spinner("Searching source code...", &opts);
            let result = tracer.search_sql(&request).await;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            Ok(match result {
                Ok(report) => CommandOutput::ok(format_search_report(&report, &opts)),
                Err(err) => CommandOutput::tool_error(&err, &opts)
            })
        }
        Commands::Transaction {
            root,
            input,
            no_source,
            max_patterns
        } => {
            resolve_root(root, &mut config)?;
            let log = read_input(&input)?;
            let mut tracer = SourceTracer::new(&config);
            let mut request = TransactionInput::new(log);
            request.max_patterns = max_patterns;
            if no_source {
                request = request.without_source();
            }

            let pb = spinner("Analyzing transaction...", &opts);
            let result = tracer.analyze_transaction(&request).await;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            Ok(match result {
                Ok(report) => CommandOutput::ok(format_transaction_report(&report, &opts)),
                Err(err) => CommandOutput::tool_error(&err, &opts)
            })
        }
        Commands::Classify {
            input
        } => {
            let text = read_input(&input)?;
            Ok(CommandOutput::ok(format_classification(&classify(&text), &opts)))
        }
        Commands::Analyze {
            sql,
            input
        } => {
            let raw = sql_input(sql, input.as_deref())?;
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(CommandOutput::tool_error(&ToolError::new("Empty SQL query"), &opts));
            }
            let extracted = extract(raw);
            let statement = match extracted.as_slice() {
                [only] if !only.sql.trim().is_empty() => only.sql.trim(),
                _ => raw
            };
            Ok(CommandOutput::ok(format_query_analysis(&analyze(statement), &opts)))
        }
    }
}
