//! Structured logging setup (SPEC_FULL §2), driven by `logging.{level,file}`.

use std::fs::File;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber. Must be called exactly
/// once, before any other module logs.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.file {
        Some(path) => {
            let file = File::create(path).expect("failed to open log file");
            builder.with_writer(file).with_ansi(false).init();
        }
        None => {
            builder.init();
        }
    }
}
