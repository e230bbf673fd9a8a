use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber, writing to stderr.
///
/// Filter precedence: `RUST_LOG`, then `MEMORYPACK_LOG`, then the level
/// implied by the flags (`--verbose` = debug, `--quiet` = error, else warn).
pub fn init(
    verbose: bool,
    quiet: bool,
    log_json: bool,
) -> Result<()>
{
    let level = match (verbose, quiet)
    {
        (true, _) => "memorypack=debug",
        (false, true) => "memorypack=error",
        (false, false) => "memorypack=warn",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("MEMORYPACK_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if log_json
    {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_span_events(fmt::format::FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| anyhow!("failed to install logger: {e}"))?;
    }
    else
    {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
            .map_err(|e| anyhow!("failed to install logger: {e}"))?;
    }

    Ok(())
}
