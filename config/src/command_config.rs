use serde::Deserialize;
use std::time::Duration;
use strum::{
    Display,
    EnumString,
};

/// How a query is fanned out over the partitions and nodes of a cluster.
#[derive(Debug, Clone, Copy, Display, EnumString, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    /// Once per cluster, against the first partition that answers.
    System,
    /// Once per partition.
    Vdc,
    /// Once per known node of every partition.
    Node,
    /// Node-local diagnostic endpoints, probed until one node answers.
    #[serde(rename = "dtinfo")]
    #[strum(to_string = "dtinfo")]
    Diagnostic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: Level,
    #[serde(default, deserialize_with = "crate::duration::deserialize_opt")]
    pub interval: Option<Duration>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}
