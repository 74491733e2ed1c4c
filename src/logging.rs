//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Environment variable holding per-module log directives
pub const LOG_ENV: &str = "SQL_TRACER_LOG";

/// Initialize the tracing subscriber.
///
/// Reads `SQL_TRACER_LOG` (e.g. `sql_source_tracer::search=debug`). Falls
/// back to `sql_source_tracer=warn`, or `sql_source_tracer=debug` when
/// `verbose` is set. Logs go to stderr so JSON/YAML output on stdout stays
/// parseable. Only the first call has an effect.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "sql_source_tracer=debug"
        } else {
            "sql_source_tracer=warn"
        };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
            )
            .with(filter)
            .init();
    });
}
