use clap::Parser;
use std::path::PathBuf;

/// Polls storage cluster management APIs and publishes the results as flat records.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Configuration file (yaml). Defaults to `ecsbeat.yaml` in the config directory.
    #[clap(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run every query once and exit once all records are published.
    #[clap(long, action)]
    pub once: bool,

    /// Default poll period for queries without their own interval, e.g. `30s` or `5m`.
    #[clap(long, value_name = "DURATION")]
    pub period: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    #[clap(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Additionally write logs to `ecsbeat.log` in the data directory.
    #[clap(long, action)]
    pub log_to_file: bool,

    /// Write records as JSON lines to this file instead of stdout.
    #[clap(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if self.once {
                cache.insert("once".to_string(), true.into());
            }
            if let Some(period) = &self.period {
                cache.insert("period".to_string(), period.clone().into());
            }
            if let Some(log_level) = &self.log_level {
                cache.insert("log_level".to_string(), log_level.clone().into());
            }
            if self.log_to_file {
                cache.insert("log_to_file".to_string(), true.into());
            }
            if let Some(output_file) = &self.output_file {
                cache.insert("output_file".to_string(), output_file.display().to_string().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let version = clap::crate_version!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "\
{version}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
