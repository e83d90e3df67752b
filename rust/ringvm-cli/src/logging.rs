//! Logging setup for the `ringvm` binary.

use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "warn";

/// Pick the filter directive: `RUST_LOG` wins, then the config file, then
/// [`DEFAULT_FILTER`].
pub fn filter_directive(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init(configured: Option<&str>) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
