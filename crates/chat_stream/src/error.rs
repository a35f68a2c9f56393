use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacerError {
    #[error("cannot append after finish()")]
    AppendAfterFinish,

    #[error("cannot append to a cancelled pacer")]
    Cancelled,
}

/// Failures of the server-push channel. Kept as strings so they can travel
/// through the channel stream and be cloned into logs and state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("event stream error: {0}")]
    Sse(String),

    #[error("channel closed before completion")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Server(String),
}

impl ApiError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server(message) => message.clone(),
            ApiError::Http(_) | ApiError::Json(_) => "Could not load conversation.".to_string(),
        }
    }
}
