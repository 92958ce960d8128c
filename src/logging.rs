//! Process-wide `tracing` setup.
//!
//! Library code only emits `tracing` records; installing a subscriber is up to
//! the binary embedding the crate. [`init`] is a ready-made one for agents and
//! tests: `RUST_LOG` filter (default `warn`), compact output on stderr.
//!
//! ```bash
//! RUST_LOG=fleetvisor=debug my-agent
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Does nothing if one is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
