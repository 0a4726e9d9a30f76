//! Structured logging setup for the command-line tool
//!
//! `RUST_LOG` wins when set; otherwise `-v` flags raise this crate's level.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Info for this crate, warn for dependencies (polars etc.)
pub const DEFAULT_FILTER: &str = "fungal_traits_rust=info,warn";

/// Filter directives for a `-v` count
pub fn filter_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => "fungal_traits_rust=debug,warn",
        _ => "fungal_traits_rust=trace,info",
    }
}

/// Install the global subscriber, writing to stderr so stdout stays clean
pub fn init_logging(verbosity: u8) -> Result<()> {
    let filter = if verbosity == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
    } else {
        EnvFilter::new(filter_directives(verbosity))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to initialize logging")
}
