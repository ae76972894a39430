//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`run`] - Program execution with streamed output
//! - [`jobs`] - Listing, attaching to and killing jobs
//! - [`config`] - Stored configuration management

pub mod config;
pub mod jobs;
pub mod run;

pub use config::ConfigCommand;
pub use jobs::JobsCommand;
pub use run::RunCommand;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use jut_client::{JobsApi, Session, StreamOptions, StreamReader, TokenManager};
use tracing::debug;

use crate::config::{ConfigStore, Configuration};
use crate::error::CliError;
use crate::output::EventPrinter;

/// Message for runs that reported an error event.
pub const RUN_FAILED: &str = "Error while running juttle, see above for details";

/// The default configuration stored under `home`.
///
/// # Errors
///
/// Returns an error if the store cannot be read or is empty.
pub fn load_default(home: &Path) -> Result<Configuration, CliError> {
    let store = ConfigStore::load(home)?;
    Ok(store.default_configuration()?.clone())
}

/// Open a session for a stored configuration.
pub(crate) async fn open_session(configuration: &Configuration) -> Result<Session, CliError> {
    debug!(configuration = %configuration.name, "opening session");
    Ok(Session::connect(
        &configuration.app_url,
        &configuration.client_id,
        &configuration.client_secret,
    )
    .await?)
}

/// Collaborators a streaming command talks to.
pub struct StreamTarget<'a> {
    /// Credential cache shared with every channel.
    pub tokens: Arc<TokenManager>,
    /// Submission and listing endpoint.
    pub jobs: &'a dyn JobsApi,
    /// Channel settings for each attempt.
    pub options: StreamOptions,
}

impl<'a> StreamTarget<'a> {
    /// Target backed by a live session with default channel settings.
    #[must_use]
    pub fn from_session(session: &'a Session) -> Self {
        Self {
            tokens: session.tokens(),
            jobs: session.jobs(),
            options: StreamOptions::default(),
        }
    }
}

/// `flag` if given, otherwise the configured deployment.
pub(crate) fn deployment_name<'a>(flag: Option<&'a str>, configuration: &'a Configuration) -> &'a str {
    flag.unwrap_or(&configuration.deployment_name)
}

/// Stream every event of `reader` through `printer`.
///
/// The output document is closed even when the stream fails, so a retried
/// run starts a fresh one.
pub(crate) async fn print_stream(
    mut reader: StreamReader,
    mut printer: EventPrinter,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    printer.start(out)?;
    let streamed = drain(&mut reader, &mut printer, out, diag).await;
    printer.stop(out)?;
    streamed?;

    debug!(points = printer.points(), state = ?reader.state(), "stream finished");
    if printer.hit_error() {
        return Err(CliError::Command(RUN_FAILED.into()));
    }
    Ok(())
}

async fn drain(
    reader: &mut StreamReader,
    printer: &mut EventPrinter,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    while let Some(event) = reader.next_event().await? {
        printer.event(out, diag, &event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn deployment_flag_overrides_configuration() {
        let configuration = Configuration::new("alice", "https://a", "id", "s", "prod");
        assert_eq!(deployment_name(None, &configuration), "prod");
        assert_eq!(deployment_name(Some("dev"), &configuration), "dev");
    }

    #[test]
    fn load_default_requires_configuration() {
        let dir = TempDir::new().unwrap();
        let err = load_default(dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
