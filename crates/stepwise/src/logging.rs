use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs the global subscriber. Logs go to stderr so stdout only carries
/// command output. `RUST_LOG` overrides the default filter.
pub fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
