//! Command-line argument parsing with clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jut_client::RetryPolicy;

use crate::config::{Selector, DEFAULT_APP_URL};

/// Jut command-line tools.
#[derive(Parser, Debug, Clone)]
#[command(name = "jut")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of `RUST_LOG`.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory holding `config.toml`. Defaults to `~/.jut`.
    #[arg(long, global = true, env = "JUT_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Table/JSON output for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Output format for streamed points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum PointFormat {
    /// A JSON array of points.
    #[default]
    Json,
    /// One space-separated line per point.
    Text,
    /// Comma-separated values with `#` header lines.
    Csv,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a juttle program and stream its output.
    Run(RunArgs),

    /// Inspect and control running jobs.
    Jobs {
        /// Jobs subcommand to execute.
        #[command(subcommand)]
        command: JobsCommands,
    },

    /// Manage stored configurations.
    Config {
        /// Config subcommand to execute.
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Run-level retry flags.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryArgs {
    /// Times to re-run after a lost connection. `-1` retries forever.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub retry: i64,

    /// Seconds to wait between runs.
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub retry_delay: u64,
}

impl RetryArgs {
    /// Policy for the client.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry, Duration::from_secs(self.retry_delay))
    }
}

/// Arguments for the run command.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Program text, or the path of a file containing it.
    #[arg(required = true, value_name = "JUTTLE")]
    pub program: String,

    /// Deployment to run on. Defaults to the configured one.
    #[arg(short, long)]
    pub deployment: Option<String>,

    /// Output format for points.
    #[arg(short, long, value_enum, default_value_t = PointFormat::Json)]
    pub format: PointFormat,

    /// Job name. Defaults to `jut-tools program <unix-seconds>`.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Leave the job running server-side and print its id.
    #[arg(long)]
    pub persist: bool,

    /// Retry flags.
    #[command(flatten)]
    pub retry: RetryArgs,

    /// Report the number of points streamed so far on stderr.
    #[arg(long)]
    pub show_progress: bool,
}

/// Jobs subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum JobsCommands {
    /// List running jobs.
    List {
        /// Deployment to inspect. Defaults to the configured one.
        #[arg(short, long)]
        deployment: Option<String>,

        /// Listing format.
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Attach to a running job and stream its output.
    Connect(ConnectArgs),

    /// Terminate a running job.
    Kill {
        /// Job to terminate.
        job_id: String,

        /// Deployment the job runs on. Defaults to the configured one.
        #[arg(short, long)]
        deployment: Option<String>,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for `jobs connect`.
#[derive(Parser, Debug, Clone)]
pub struct ConnectArgs {
    /// Job to attach to.
    pub job_id: String,

    /// Deployment the job runs on. Defaults to the configured one.
    #[arg(short, long)]
    pub deployment: Option<String>,

    /// Output format for points.
    #[arg(short, long, value_enum, default_value_t = PointFormat::Json)]
    pub format: PointFormat,

    /// Retry flags.
    #[command(flatten)]
    pub retry: RetryArgs,

    /// Report the number of points streamed so far on stderr.
    #[arg(long)]
    pub show_progress: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// List stored configurations.
    List {
        /// Listing format.
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Store a new configuration.
    Add(AddConfigArgs),

    /// Remove a configuration by name or 1-based index.
    Rm {
        /// `username@app_url` or list index.
        configuration: Selector,
    },

    /// Make a configuration the default one.
    Default {
        /// `username@app_url` or list index.
        configuration: Selector,
    },
}

/// Arguments for `config add`.
#[derive(Parser, Debug, Clone)]
pub struct AddConfigArgs {
    /// Account username.
    #[arg(short, long)]
    pub username: String,

    /// App URL of the environment.
    #[arg(short, long, default_value = DEFAULT_APP_URL)]
    pub app_url: String,

    /// OAuth client id.
    #[arg(long, env = "JUT_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret.
    #[arg(long, env = "JUT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Default deployment. Looked up when the account has exactly one.
    #[arg(short, long)]
    pub deployment: Option<String>,

    /// Make this the default configuration.
    #[arg(long)]
    pub default: bool,
}
