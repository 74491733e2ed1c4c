use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// SQL Source Tracer - Find the Rails code behind captured SQL
#[derive(Parser, Debug)]
#[command(name = "sql-source-tracer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs
}

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", global = true)]
    pub output_format: Format,

    /// Code search backend (overrides config and SQL_TRACER_BACKEND)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Enable debug logging and extra output detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank source locations that could have produced one SQL statement
    Search {
        /// Root of the Rails application
        #[arg(short, long, env = "SQL_TRACER_PROJECT_ROOT")]
        root: Option<PathBuf>,

        /// SQL text (or a log line containing it)
        #[arg(long, conflicts_with = "input")]
        sql: Option<String>,

        /// File holding the SQL (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Maximum number of matches to return
        #[arg(long)]
        max_results: Option<usize>,

        /// Also report view templates that use the matched relation
        #[arg(long)]
        usage_sites: bool
    },

    /// Reconstruct a transaction log and correlate it with source code
    Transaction {
        /// Root of the Rails application
        #[arg(short, long, env = "SQL_TRACER_PROJECT_ROOT")]
        root: Option<PathBuf>,

        /// File holding the transaction log (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Skip the source code search
        #[arg(long)]
        no_source: bool,

        /// Maximum number of individual statements to search for
        #[arg(long)]
        max_patterns: Option<usize>
    },

    /// Decide whether input is a single statement or a transaction log
    Classify {
        /// File holding the input (use - for stdin)
        #[arg(short, long)]
        input: PathBuf
    },

    /// Print the semantic analysis of one SQL statement
    Analyze {
        /// SQL text
        #[arg(long, conflicts_with = "input")]
        sql: Option<String>,

        /// File holding the SQL (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    Ripgrep,
    Walk
}
