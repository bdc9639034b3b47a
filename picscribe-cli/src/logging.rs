use picscribe::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `--verbose`, which
/// wins over the configured level.
pub fn init(
    config: &LoggingConfig,
    verbose: bool,
    quiet: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Records from crates that log through `log` go to the same subscriber.
    tracing_log::LogTracer::init()?;

    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        config.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
