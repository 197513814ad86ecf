//! Error types for the GitLab client

use gitlab_comment_core::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The token cannot be sent as a header value
    #[error("invalid token format")]
    InvalidToken,

    #[error("build HTTP client: {0}")]
    Build(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("GitLab API error ({status}) on {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("failed to parse response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api {
                status,
                endpoint,
                message,
            } => StoreError::Api {
                status,
                endpoint,
                message,
            },
            ClientError::Decode { endpoint, message } => {
                StoreError::Decode(format!("{endpoint}: {message}"))
            }
            other => StoreError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
