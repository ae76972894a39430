//! CLI error types.

use jut_client::ClientError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by the service client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// Command ran but did not succeed.
    #[error("{0}")]
    Command(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Whether the socket gave out under the run.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_transport())
    }

    /// Whether the job vanished server-side.
    #[must_use]
    pub const fn is_job_not_found(&self) -> bool {
        matches!(self, Self::Client(ClientError::JobNotFound(_)))
    }
}
