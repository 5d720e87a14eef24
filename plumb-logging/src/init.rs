use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the internal tracing filter
pub const INTERNAL_LOG_VAR: &str = "PLUMB_INTERNAL_LOG";

/// Build the filter for internal diagnostics: `PLUMB_INTERNAL_LOG` first,
/// then `default_directive`, then `warn`
pub fn internal_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(INTERNAL_LOG_VAR)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Route the library's own tracing output to stderr.
///
/// Standard output is left to the structured lines. Safe to call more than
/// once; later calls are no-ops.
pub fn init_internal_tracing(default_directive: &str) -> Result<()> {
    let env_filter = internal_filter(default_directive);

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
