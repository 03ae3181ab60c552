//! Durations in the configuration are written either as humantime strings
//! (`30s`, `5m`, `1h 30m`) or as a plain number of seconds.

use serde::{
    Deserialize,
    Deserializer,
};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => {
                let text = text.trim();
                if let Ok(secs) = text.parse::<u64>() {
                    return Ok(Duration::from_secs(secs));
                }
                humantime::parse_duration(text).map_err(|e| E::custom(format!("invalid duration '{text}': {e}")))
            }
        }
    }
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?.into_duration()
}

pub(crate) fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDuration>::deserialize(deserializer)? {
        Some(raw) => raw.into_duration().map(Some),
        None => Ok(None),
    }
}
