//! # SQL Source Tracer
//!
//! Find the Rails source code behind captured SQL.
//!
//! `sql-source-tracer` takes a SQL statement (or a whole transaction log)
//! captured from a running application and ranks the places in a Rails
//! code base that could have produced it.
//!
//! # Quick Start
//!
//! ```bash
//! # One statement, inline or from a log excerpt
//! sql-source-tracer search --root ~/src/app \
//!     --sql 'SELECT "members".* FROM "members" WHERE "members"."company_id" = $1 LIMIT 10'
//!
//! # A transaction log from the MySQL general log
//! sql-source-tracer transaction --root ~/src/app --input tx.log -f json
//!
//! # Stream input from stdin
//! pbpaste | sql-source-tracer classify --input -
//! ```
//!
//! # Exit Codes
//!
//! - `0` - A result was produced
//! - `1` - Infrastructure failure (unreadable input, invalid config, missing root)
//! - `2` - The tool returned an error value (empty input, transaction log
//!   given to `search`, no project root)
//!
//! # Logging
//!
//! Diagnostics go to stderr. Set `SQL_TRACER_LOG` for per-module filters,
//! e.g. `SQL_TRACER_LOG=sql_source_tracer::search=debug`.

use std::process;

use clap::Parser;
use sql_source_tracer::{
    app::run_command,
    cli::Cli,
    config::Config,
    error::AppResult,
    logging
};
use tokio::main;

#[main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run() -> AppResult<i32> {
    let cli = Cli::parse();
    logging::init(cli.common.verbose);
    let config = Config::load()?;

    let result = run_command(cli, config).await?;
    println!("{}", result.output.trim_end());
    Ok(result.exit_code)
}
