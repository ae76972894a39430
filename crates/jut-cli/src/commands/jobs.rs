//! Jobs command implementation.
//!
//! Provides subcommands for:
//! - Listing running jobs across a deployment's endpoints
//! - Attaching to a running job
//! - Killing a job

use std::io::{BufRead, Write};

use std::sync::Arc;

use jut_client::{list_all, locate_job, JobsApi, RunRetry, Session, StreamReader};
use tracing::info;

use super::{deployment_name, open_session, print_stream, StreamTarget};
use crate::cli::{ConnectArgs, Format, JobsCommands};
use crate::config::Configuration;
use crate::error::CliError;
use crate::output::{EventPrinter, JobTable, Message, OutputFormat};

/// Prompt shown before a job is killed.
pub const KILL_PROMPT: &str = "Are you sure you want to delete the above job? (Y/N)";

/// Jobs command executor.
pub struct JobsCommand {
    configuration: Configuration,
}

impl JobsCommand {
    /// Create a new jobs command.
    #[must_use]
    pub const fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }

    /// Execute a jobs subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    pub async fn execute<W: Write, E: Write, R: BufRead>(
        &self,
        out: &mut W,
        diag: &mut E,
        input: &mut R,
        command: &JobsCommands,
    ) -> Result<(), CliError> {
        let session = open_session(&self.configuration).await?;

        match command {
            JobsCommands::List { deployment, format } => {
                let urls = self.data_urls(&session, deployment.as_deref()).await?;
                list_jobs(session.jobs(), &urls, *format, out, diag).await?;
            }
            JobsCommands::Connect(args) => {
                let urls = self.data_urls(&session, args.deployment.as_deref()).await?;
                let target = StreamTarget::from_session(&session);
                connect_job(&target, &urls, args, out, diag).await?;
            }
            JobsCommands::Kill {
                job_id,
                deployment,
                yes,
            } => {
                let urls = self.data_urls(&session, deployment.as_deref()).await?;
                kill_job(session.jobs(), &urls, job_id, *yes, out, input).await?;
            }
        }
        Ok(())
    }

    async fn data_urls(
        &self,
        session: &Session,
        deployment: Option<&str>,
    ) -> Result<Vec<String>, CliError> {
        let deployment = deployment_name(deployment, &self.configuration);
        Ok(session.deployments().juttle_data_urls(deployment).await?)
    }
}

/// Print every running job, or `No running jobs` on `diag`.
///
/// # Errors
///
/// Returns an error if listing or writing fails.
pub async fn list_jobs(
    jobs: &dyn JobsApi,
    data_urls: &[String],
    format: Format,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    let running = list_all(jobs, data_urls).await?;
    if running.is_empty() {
        writeln!(diag, "No running jobs")?;
        return Ok(());
    }
    OutputFormat::new(format).write(&mut *out, &JobTable { jobs: running })
}

/// Locate a job, confirm unless `yes`, and delete it.
///
/// # Errors
///
/// Returns an error if the job cannot be found, the answer is not `Y`, or
/// the deletion fails.
pub async fn kill_job(
    jobs: &dyn JobsApi,
    data_urls: &[String],
    job_id: &str,
    yes: bool,
    out: &mut dyn Write,
    input: &mut dyn BufRead,
) -> Result<(), CliError> {
    let job = locate_job(jobs, data_urls, job_id).await?;

    if !yes {
        OutputFormat::default().write(
            &mut *out,
            &JobTable {
                jobs: vec![job.clone()],
            },
        )?;
        let answer = prompt(out, input, KILL_PROMPT)?;
        if answer != "Y" {
            return Err(CliError::Command(format!("Unexpected option \"{answer}\"")));
        }
    }

    jobs.delete(&job.data_url, &job.id).await?;
    OutputFormat::default().write(&mut *out, &Message::new(format!("Job {} deleted", job.id)))
}

/// Write `message` and read one trimmed line.
///
/// # Errors
///
/// Returns an error if writing or reading fails.
pub fn prompt(out: &mut dyn Write, input: &mut dyn BufRead, message: &str) -> Result<String, CliError> {
    write!(out, "{message} ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Attach to a running job and print its output.
///
/// Lost connections are retried under the `--retry` policy. A job that no
/// longer exists is reported at once.
///
/// # Errors
///
/// Returns an error if the job cannot be found, the last attempt fails, or
/// the job reported an error event.
pub async fn connect_job(
    target: &StreamTarget<'_>,
    data_urls: &[String],
    args: &ConnectArgs,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    let mut retry = RunRetry::new(args.retry.policy());
    loop {
        match connect_once(target, data_urls, args, out, diag).await {
            Err(e) if e.is_transport() && retry.can_retry() => retry.wait(&e).await,
            result => return result,
        }
    }
}

async fn connect_once(
    target: &StreamTarget<'_>,
    data_urls: &[String],
    args: &ConnectArgs,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    let job = locate_job(target.jobs, data_urls, &args.job_id).await?;
    info!(job_id = %job.id, data_url = %job.data_url, "connecting to job");

    let reader = StreamReader::attach(
        Arc::clone(&target.tokens),
        job.data_url,
        job.id,
        target.options.clone(),
    )
    .await?;
    let printer = EventPrinter::new(args.format, false, args.show_progress);
    print_stream(reader, printer, out, diag).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jut_client::ClientError;
    use jut_proto::{JobInfo, JobRequest, JobSummary};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakeJobs {
        running: Vec<JobSummary>,
        deleted: Mutex<Vec<(String, String)>>,
    }

    impl FakeJobs {
        fn with(ids: &[(&str, &str)]) -> Self {
            let running = ids
                .iter()
                .map(|(id, url)| JobSummary {
                    id: (*id).into(),
                    alias: Some("demo".into()),
                    user: Some("u-1".into()),
                    start_time: Some("2014-01-01T00:00:00.000Z".into()),
                    timeout: Some(0),
                    data_url: (*url).into(),
                })
                .collect();
            Self {
                running,
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn deleted(&self) -> Vec<(String, String)> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobsApi for FakeJobs {
        async fn submit(&self, _: &str, _: &JobRequest) -> Result<JobInfo, ClientError> {
            Err(ClientError::Api {
                status: 500,
                message: "unused".into(),
            })
        }

        async fn list(&self, data_url: &str) -> Result<Vec<JobSummary>, ClientError> {
            Ok(self
                .running
                .iter()
                .filter(|j| j.data_url == data_url)
                .cloned()
                .collect())
        }

        async fn delete(&self, data_url: &str, job_id: &str) -> Result<(), ClientError> {
            self.deleted
                .lock()
                .unwrap()
                .push((data_url.to_string(), job_id.to_string()));
            Ok(())
        }
    }

    fn urls() -> Vec<String> {
        vec!["http://a".into(), "http://b".into()]
    }

    #[tokio::test]
    async fn list_prints_table() {
        let jobs = FakeJobs::with(&[("job-1", "http://a"), ("job-2", "http://b")]);
        let mut out = Vec::new();
        let mut diag = Vec::new();

        list_jobs(&jobs, &urls(), Format::Table, &mut out, &mut diag).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("job-1"));
        assert!(out.contains("job-2"));
        assert!(out.contains("YES"));
        assert!(diag.is_empty());
    }

    #[tokio::test]
    async fn list_reports_no_jobs_on_stderr() {
        let jobs = FakeJobs::with(&[]);
        let mut out = Vec::new();
        let mut diag = Vec::new();

        list_jobs(&jobs, &urls(), Format::Table, &mut out, &mut diag).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(String::from_utf8(diag).unwrap(), "No running jobs\n");
    }

    #[tokio::test]
    async fn kill_with_yes_skips_prompt() {
        let jobs = FakeJobs::with(&[("job-2", "http://b")]);
        let mut out = Vec::new();
        let mut input = Cursor::new(Vec::new());

        kill_job(&jobs, &urls(), "job-2", true, &mut out, &mut input).await.unwrap();

        assert_eq!(jobs.deleted(), vec![("http://b".to_string(), "job-2".to_string())]);
        assert!(!String::from_utf8(out).unwrap().contains(KILL_PROMPT));
    }

    #[tokio::test]
    async fn kill_confirmed_deletes() {
        let jobs = FakeJobs::with(&[("job-1", "http://a")]);
        let mut out = Vec::new();
        let mut input = Cursor::new(b"Y\n".to_vec());

        kill_job(&jobs, &urls(), "job-1", false, &mut out, &mut input).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(KILL_PROMPT));
        assert!(out.contains("Job job-1 deleted"));
        assert_eq!(jobs.deleted().len(), 1);
    }

    #[tokio::test]
    async fn kill_declined_aborts() {
        let jobs = FakeJobs::with(&[("job-1", "http://a")]);
        let mut out = Vec::new();
        let mut input = Cursor::new(b"n\n".to_vec());

        let err = kill_job(&jobs, &urls(), "job-1", false, &mut out, &mut input)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unexpected option \"n\"");
        assert!(jobs.deleted().is_empty());
    }

    #[tokio::test]
    async fn kill_unknown_job_is_not_found() {
        let jobs = FakeJobs::with(&[("job-1", "http://a")]);
        let mut out = Vec::new();
        let mut input = Cursor::new(b"Y\n".to_vec());

        let err = kill_job(&jobs, &urls(), "job-9", false, &mut out, &mut input)
            .await
            .unwrap_err();

        assert!(err.is_job_not_found());
        assert!(out.is_empty());
    }
}
