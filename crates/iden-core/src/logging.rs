use crate::config::LoggingConfig;
use iden_types::{IdenError, IdenResult};
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Installs the global subscriber. `RUST_LOG` overrides the configured
/// level. Calling this again once a subscriber is set does nothing.
pub fn init_logging(cfg: &LoggingConfig) -> IdenResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.to_string()));

    let writer = match &cfg.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| IdenError::Config(format!("Failed to open log file: {}", e)))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let ansi = cfg.file.is_none();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (cfg.json, cfg.timestamps) {
        (true, true) => fmt::layer().json().with_writer(writer).boxed(),
        (true, false) => fmt::layer().json().without_time().with_writer(writer).boxed(),
        (false, true) => fmt::layer().with_ansi(ansi).with_writer(writer).boxed(),
        (false, false) => fmt::layer()
            .with_ansi(ansi)
            .without_time()
            .with_writer(writer)
            .boxed(),
    };

    if tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialised");
    }
    Ok(())
}
