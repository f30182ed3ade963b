//! Development-time tracing for debugging arbitration.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not part of the puppeteer's product output.
//!
//! - **Turn log (`core/turn_log`)**: Decision log returned by
//!   [`Puppeteer::log`](crate::Puppeteer::log) every turn, unaffected by `RUST_LOG`.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `RUST_LOG`-filtered subscriber writing compact lines to stderr.
///
/// Defaults to `warn` when `RUST_LOG` is unset. Fails if the embedding
/// application already installed a global subscriber.
///
/// ```bash
/// RUST_LOG=puppeteer=debug cargo test
/// ```
pub fn try_init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {}", err))
}
