use anyhow::anyhow;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

pub const DEFAULT_FILTER: &str = "nhl_sync=info";

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Output goes to stderr so stdout stays free for the run summary.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}
