//! Entry point for symstage.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Set up logging; `-v` prints per-image progress and timing.
//! 3. Hand the resolved configuration to the `Publisher` with the MSVC backend.
//!
//! Error handling is done via `anyhow`: any failure ends the run with a
//! non-zero exit status.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use symstage::config::Config;
use symstage::publisher::Publisher;
use symstage::toolchain::msvc::Msvc;

fn main() -> Result<()> {
    let config = Config::parse().resolve()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let publisher = Publisher::new(Msvc::from_config(&config), config);
    let published = publisher.run()?;

    tracing::info!(
        "Published {} images to {}",
        published.len(),
        publisher.config().symbols_dir.display()
    );
    Ok(())
}
