//! Command-line front end for the `histdata-ingestor` binary.

pub mod commands;
pub mod params;

pub use commands::{Cli, Commands, IngestArgs};

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
