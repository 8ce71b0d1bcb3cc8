//! Log output for command-line clients.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber that writes to stderr.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"warn"` or
/// `"warn,grpcli=debug"`). Standard output is left alone: it carries the
/// encoded response.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging("warn");
        assert!(init_logging("debug").is_err());
    }
}
