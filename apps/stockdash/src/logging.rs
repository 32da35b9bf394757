//! Tracing subscriber setup.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Filter precedence: `-v` count > `RUST_LOG` > `logging.level`.
#[must_use]
pub fn filter_for(verbose: u8, cfg: &LoggingConfig) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&cfg.level))
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug,hyper=warn,hyper_util=warn,rustls=warn,sqlx=warn"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber. Output goes to stderr so that command
/// output on stdout stays machine readable.
pub fn init(verbose: u8, cfg: &LoggingConfig) {
    let filter = filter_for(verbose, cfg);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match cfg.format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    if Registry::default()
        .with(layer.with_filter(filter))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
}
