/// Errors returned by generation clients.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The vendor answered with a non-success status.
    #[error("vendor returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The vendor answered without usable content.
    #[error("empty response: {0}")]
    EmptyResponse(String),
    /// No candidate model was configured.
    #[error("no models configured")]
    NoModels,
    /// The response body could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),
}

impl AiError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::EmptyResponse(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NoModels | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
