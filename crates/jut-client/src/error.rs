//! Error types for jut-client.

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The authentication service rejected the credentials.
    #[error("authentication failed ({status}): {message}")]
    Authentication {
        /// HTTP status returned by the auth service.
        status: u16,
        /// Body or reason.
        message: String,
    },

    /// Socket-level failure: refused, reset, closed or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame or handshake.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The service refused the program.
    #[error("job submission failed ({status}): {body}")]
    JobSubmission {
        /// HTTP status of the submission.
        status: u16,
        /// Full response body, for diagnostics.
        body: Value,
    },

    /// The job no longer exists server-side.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// A REST collaborator answered with an unexpected status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Body or reason.
        message: String,
    },

    /// Invalid client configuration, such as an unusable URL.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the socket reconnect loop may retry after this error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<jut_proto::ProtoError> for ClientError {
    fn from(err: jut_proto::ProtoError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
