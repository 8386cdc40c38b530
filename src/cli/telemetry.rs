use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Map the `-v` count to a log level
#[must_use]
pub const fn level_from_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber, logging to stderr so stdout keeps only the
/// connection outcomes. `RUST_LOG` wins over `-v` when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
