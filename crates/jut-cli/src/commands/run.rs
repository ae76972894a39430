//! Run command implementation.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use jut_client::{RunRetry, StreamReader};
use tracing::{debug, info};

use super::{deployment_name, open_session, print_stream, StreamTarget};
use crate::cli::RunArgs;
use crate::config::Configuration;
use crate::error::CliError;
use crate::output::EventPrinter;

/// Run command executor.
pub struct RunCommand {
    configuration: Configuration,
}

impl RunCommand {
    /// Create a new run command.
    #[must_use]
    pub const fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }

    /// Submit the program and stream its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the run fails or reported an error event.
    pub async fn execute<W: Write, E: Write>(
        &self,
        out: &mut W,
        diag: &mut E,
        args: &RunArgs,
    ) -> Result<(), CliError> {
        let program = load_program(&args.program)?;
        let alias = args.name.clone().unwrap_or_else(default_alias);
        let session = open_session(&self.configuration).await?;
        let deployment = deployment_name(args.deployment.as_deref(), &self.configuration);
        let data_url = session.deployments().juttle_data_url(deployment).await?;
        info!(deployment = %deployment, data_url = %data_url, alias = %alias, "running program");

        let target = StreamTarget::from_session(&session);
        run_program(&target, &data_url, &program, &alias, args, out, diag).await
    }
}

/// Submit `program` to `data_url` and print its output.
///
/// Lost connections and jobs that vanished server-side re-submit the
/// program under the `--retry` policy, each attempt printing a fresh
/// document.
///
/// # Errors
///
/// Returns an error if the last attempt fails or reported an error event.
pub async fn run_program(
    target: &StreamTarget<'_>,
    data_url: &str,
    program: &str,
    alias: &str,
    args: &RunArgs,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    let mut retry = RunRetry::new(args.retry.policy());
    loop {
        match run_once(target, data_url, program, alias, args, out, diag).await {
            Err(e) if (e.is_transport() || e.is_job_not_found()) && retry.can_retry() => {
                retry.wait(&e).await;
            }
            result => return result,
        }
    }
}

async fn run_once(
    target: &StreamTarget<'_>,
    data_url: &str,
    program: &str,
    alias: &str,
    args: &RunArgs,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    let reader = StreamReader::run(
        Arc::clone(&target.tokens),
        target.jobs,
        data_url,
        program,
        Some(alias.to_string()),
        target.options.clone().with_persist(args.persist),
    )
    .await?;

    let printer = EventPrinter::new(args.format, args.persist, args.show_progress);
    print_stream(reader, printer, out, diag).await
}

/// The program text: the file's contents if `arg` names a file, otherwise
/// `arg` itself.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_program(arg: &str) -> Result<String, CliError> {
    let path = Path::new(arg);
    if path.is_file() {
        debug!(path = %path.display(), "reading program from file");
        return Ok(std::fs::read_to_string(path)?);
    }
    Ok(arg.to_string())
}

/// Job name used when `--name` is not given.
#[must_use]
pub fn default_alias() -> String {
    format!("jut-tools program {}", chrono::Utc::now().timestamp())
}
