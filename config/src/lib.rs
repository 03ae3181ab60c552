#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod command_config;
mod customer;
mod duration;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::Args;
pub use command_config::{
    CommandConfig,
    Level,
};
pub use customer::{
    Customer,
    VdcConfig,
};
use eyre::{
    eyre,
    Result,
};
use serde::Deserialize;
use std::{
    collections::HashSet,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const CONFIG_FILE_NAME: &str = "ecsbeat.yaml";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    app_config: AppConfig,
    /// Poll interval for commands that do not carry their own.
    #[serde(deserialize_with = "duration::deserialize")]
    pub period: Duration,
    #[serde(default)]
    pub once: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Layers the embedded defaults, the config file, `ECSBEAT_*` environment variables and the command line.
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = Self::builder(&data_dir, &config_dir)?;

        builder = match &args.config {
            Some(file) => {
                debug!(?file, "loading configuration file");
                builder.add_source(config::File::from(file.as_path()).format(config::FileFormat::Yaml))
            }
            None => builder.add_source(
                config::File::from(config_dir.join(CONFIG_FILE_NAME))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            ),
        };

        builder = builder
            .add_source(
                config::Environment::with_prefix(app_config::PROJECT_NAME.as_str())
                    .prefix_separator("_")
                    .separator("__"),
            )
            .add_source(args);

        builder.build()?.try_deserialize()
    }

    /// Builds a configuration from the embedded defaults and the given yaml document only.
    pub fn from_yaml(content: &str) -> Result<Self, config::ConfigError> {
        Self::builder(&get_data_dir(), &get_config_dir())?
            .add_source(config::File::from_str(content, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    fn builder(
        data_dir: &Path,
        config_dir: &Path,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        Ok(config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }

    pub fn enabled_commands(&self) -> impl Iterator<Item = &CommandConfig> {
        self.commands.iter().filter(|command| command.enabled)
    }

    /// The command's own interval if it has a non-zero one, the global period otherwise.
    pub fn effective_interval(&self, command: &CommandConfig) -> Duration {
        command
            .interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(self.period)
    }

    pub fn validate(&self) -> Result<()> {
        if self.customers.is_empty() {
            return Err(eyre!("config.customers must be non-empty"));
        }

        let mut names = HashSet::new();
        for customer in &self.customers {
            if !names.insert(customer.customer_name.as_str()) {
                return Err(eyre!("duplicate customer '{}'", customer.customer_name));
            }
            if customer.vdcs.is_empty() {
                return Err(eyre!("customer '{}' has no vdcs configured", customer.customer_name));
            }
            for vdc in &customer.vdcs {
                if vdc.nodes.is_empty() {
                    return Err(eyre!(
                        "vdc '{}' of customer '{}' has no nodes configured",
                        vdc.vdc_name,
                        customer.customer_name
                    ));
                }
            }
        }

        for command in self.enabled_commands() {
            if command.uri.trim().is_empty() {
                return Err(eyre!("command of type '{}' has an empty uri", command.kind));
            }
            if self.effective_interval(command).is_zero() {
                return Err(eyre!("command '{}' has a zero poll interval", command.uri));
            }
        }

        Ok(())
    }
}
