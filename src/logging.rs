use ecsbeat_config::Config;
use eyre::{
    Context as _,
    Result,
};
use std::{
    fs::OpenOptions,
    sync::Mutex,
};
use tracing_subscriber::{
    fmt,
    prelude::*,
    EnvFilter,
};

lazy_static::lazy_static! {
    static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Logs go to stderr, stdout carries the records. `RUST_LOG` takes precedence over the configured level.
pub fn log_init(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.log_level))?,
    };

    let file_layer = if config.log_to_file {
        let directory = config.data_dir();
        std::fs::create_dir_all(directory).context("Failed to create data directory")?;
        let log_path = directory.join(LOG_FILE.as_str());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open {}", log_path.display()))?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
