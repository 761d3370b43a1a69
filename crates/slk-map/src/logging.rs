//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays clean for JSON output. `RUST_LOG` overrides the
//! default filter.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER_DEBUG: &str = "debug,hyper_util=info,reqwest::connect=info,rustls=info";
const DEFAULT_FILTER_RELEASE: &str = "info";

fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        DEFAULT_FILTER_DEBUG
    } else {
        DEFAULT_FILTER_RELEASE
    }
}

pub fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);

    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::debug!("Tracing initialized");
}
