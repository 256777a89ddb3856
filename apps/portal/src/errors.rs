use thiserror::Error;

/// Client-level error type. Every API and controller operation surfaces one of
/// these; nothing is left to propagate as an unhandled failure, and nothing
/// here is fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session could not be recovered (no refresh token, or the refresh
    /// call itself failed). Credentials are already cleared when this
    /// surfaces; the caller should route to the login entry point.
    #[error("session invalid, login required")]
    SessionInvalid,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by server policy: {0}")]
    Conflict(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether re-triggering the same action can plausibly succeed.
    /// Presentation uses this to phrase user feedback ("try again" vs
    /// "log in again" vs "fix the input").
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Server { .. } => true,
            ApiError::InvalidCredentials
            | ApiError::SessionInvalid
            | ApiError::Validation(_)
            | ApiError::NotFound(_)
            | ApiError::Conflict(_)
            | ApiError::Decode(_) => false,
        }
    }
}
