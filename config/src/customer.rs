use serde::Deserialize;
use std::{
    fmt,
    time::Duration,
};

/// One tenant: credentials, client tuning and the static partition/node layout of its cluster.
#[derive(Clone, Deserialize)]
pub struct Customer {
    pub customer_name: String,
    pub username: String,
    pub password: String,
    #[serde(default = "defaults::token_expiry", deserialize_with = "crate::duration::deserialize")]
    pub token_expiry: Duration,
    #[serde(default = "defaults::request_timeout", deserialize_with = "crate::duration::deserialize")]
    pub request_timeout: Duration,
    #[serde(default = "defaults::block_duration", deserialize_with = "crate::duration::deserialize")]
    pub block_duration: Duration,
    /// Zero disables the periodic metadata refresh.
    #[serde(default, deserialize_with = "crate::duration::deserialize")]
    pub refresh_interval: Duration,
    #[serde(default = "defaults::scheme")]
    pub scheme: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    #[serde(default = "defaults::auxiliary_port")]
    pub auxiliary_port: u16,
    #[serde(default = "defaults::accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub vdcs: Vec<VdcConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VdcConfig {
    pub vdc_name: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl fmt::Debug for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Customer")
            .field("customer_name", &self.customer_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("token_expiry", &self.token_expiry)
            .field("request_timeout", &self.request_timeout)
            .field("block_duration", &self.block_duration)
            .field("refresh_interval", &self.refresh_interval)
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("auxiliary_port", &self.auxiliary_port)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("vdcs", &self.vdcs)
            .finish()
    }
}

mod defaults {
    use std::time::Duration;

    pub(super) fn token_expiry() -> Duration {
        Duration::from_secs(60 * 60)
    }

    pub(super) fn request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub(super) fn block_duration() -> Duration {
        Duration::from_secs(5 * 60)
    }

    pub(super) fn scheme() -> String {
        "https".to_string()
    }

    pub(super) fn port() -> u16 {
        4443
    }

    pub(super) fn auxiliary_port() -> u16 {
        9101
    }

    pub(super) fn accept_invalid_certs() -> bool {
        true
    }
}
