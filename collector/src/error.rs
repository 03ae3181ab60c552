use ecsbeat_mgmt::MgmtError;

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Mgmt(#[from] MgmtError),
    #[error("invalid response content: {0}")]
    InvalidResponseContent(String),
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read the response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("collection was cancelled")]
    Cancelled,
}

impl CollectError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponseContent(reason.into())
    }
}
