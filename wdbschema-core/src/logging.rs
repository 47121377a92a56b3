//! Shared logging setup for the wdbschema binary.

use crate::error::{Result, SchemaScriptError};

/// Initializes structured logging on stderr based on verbosity level.
///
/// Verbosity 0 is INFO, 1 is DEBUG, 2+ is TRACE; `quiet` forces ERROR only.
/// Logs go to stderr so the generated script on stdout stays clean.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            SchemaScriptError::configuration(format!("failed to initialize logging: {e}"))
        })?;

    Ok(())
}
