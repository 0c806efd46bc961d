//! Error types for the geoview token manager

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The exchange endpoint could not be reached.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered but refused to issue a token. The message is
    /// the endpoint's own detail text when it supplied one.
    #[error("{0}")]
    AuthenticationRejected(String),

    #[error("Failed to decode stored credentials: {0}")]
    Decode(String),

    #[error("No stored credentials found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn rejected(message: impl Into<String>) -> Self {
        AuthError::AuthenticationRejected(message.into())
    }

    /// Whether the failure came from the remote authority rather than local state
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AuthError::Transport(_) | AuthError::AuthenticationRejected(_)
        )
    }
}
