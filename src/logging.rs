use flexi_logger::{Logger, LoggerHandle};

/// Start logging to stderr. `RUST_LOG` overrides the level picked from `verbose`.
///
/// Keep the returned handle alive for the lifetime of the program.
pub fn setup_logging(verbose: bool) -> anyhow::Result<LoggerHandle> {
    let base_level = if verbose { "debug" } else { "info" };
    let handle = Logger::try_with_env_or_str(base_level)?
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}
