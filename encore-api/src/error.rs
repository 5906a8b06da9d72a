#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Network transport failure: {0}")]
    Transport(String),

    #[error("Request rejected by server: {0}")]
    Validation(String),

    #[error("Permission denied")]
    PermissionDenied,
}

impl Error {
    /// True when retrying the exact same request could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Unknown(_))
    }
}
