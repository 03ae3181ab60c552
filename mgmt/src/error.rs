use reqwest::{
    Method,
    StatusCode,
};
use strum::Display;

#[derive(thiserror::Error, Debug)]
pub enum MgmtError {
    #[error("no management node available")]
    NoNodeAvailable,
    #[error("no management node available, last failure: {cause}")]
    Exhausted {
        #[source]
        cause: Box<MgmtError>,
    },
    #[error("[{client}] {method} {url} failed: {source}")]
    Transport {
        client: String,
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("[{client}] {method} {url}: {}", StatusCode::UNAUTHORIZED)]
    Unauthorized { client: String, method: Method, url: String },
    #[error("[{client}] {method} {url}: {status}")]
    Status {
        client: String,
        method: Method,
        url: String,
        status: StatusCode,
    },
    #[error("[{client}] login succeeded without returning an auth token")]
    MissingToken { client: String },
    #[error("failed to read the response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to encode the request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("malformed diagnostic document: {0}")]
    Diagnostic(String),
    #[error("failed to build the HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Coarse classification that drives retry and blocklisting decisions.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorKind {
    /// Connection failure or timeout; the node gets blocklisted.
    Transport,
    /// 401; the token is invalidated before the next attempt.
    Authentication,
    /// Any other unsuccessful status.
    Protocol,
    /// The response arrived but could not be interpreted.
    Content,
    /// Every node is blocklisted.
    Exhaustion,
    /// Local failures such as building the client or encoding a body.
    Internal,
}

impl MgmtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MgmtError::NoNodeAvailable | MgmtError::Exhausted { .. } => ErrorKind::Exhaustion,
            MgmtError::Transport { .. } => ErrorKind::Transport,
            MgmtError::Unauthorized { .. } | MgmtError::MissingToken { .. } => ErrorKind::Authentication,
            MgmtError::Status { .. } => ErrorKind::Protocol,
            MgmtError::Decode { .. } | MgmtError::Diagnostic(_) => ErrorKind::Content,
            MgmtError::Encode(_) | MgmtError::Client(_) => ErrorKind::Internal,
        }
    }
}
