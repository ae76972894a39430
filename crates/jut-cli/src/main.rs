//! Jut CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jut_cli::cli::{Cli, Commands};
use jut_cli::commands::{load_default, ConfigCommand, JobsCommand, RunCommand};
use jut_cli::config::jut_home;
use jut_cli::CliError;

/// Exit status for any failure.
const FAILURE: u8 = 255;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::from(FAILURE);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let home = jut_home(cli.home.as_deref())?;
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr();

    match cli.command {
        Commands::Run(args) => {
            let cmd = RunCommand::new(load_default(&home)?);
            cmd.execute(&mut stdout, &mut stderr, &args).await?;
        }
        Commands::Jobs { command } => {
            let cmd = JobsCommand::new(load_default(&home)?);
            let mut stdin = io::stdin().lock();
            cmd.execute(&mut stdout, &mut stderr, &mut stdin, &command)
                .await?;
        }
        Commands::Config { command } => {
            let cmd = ConfigCommand::new(home);
            cmd.execute(&mut stdout, &command).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jut_cli::cli::{ConfigCommands, JobsCommands, PointFormat};
    use jut_cli::config::Selector;

    #[test]
    fn cli_parses_run() {
        let cli = Cli::parse_from([
            "jut", "run", "--persist", "--retry", "-1", "--retry-delay", "3", "-f", "csv",
            "read stochastic -last :1h:",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.persist);
                assert_eq!(args.retry.retry, -1);
                assert_eq!(args.retry.retry_delay, 3);
                assert_eq!(args.format, PointFormat::Csv);
                assert_eq!(args.program, "read stochastic -last :1h:");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_jobs_connect() {
        let cli = Cli::parse_from(["jut", "jobs", "connect", "job-1"]);
        match cli.command {
            Commands::Jobs {
                command: JobsCommands::Connect(args),
            } => {
                assert_eq!(args.job_id, "job-1");
                assert_eq!(args.retry.retry, 0);
            }
            _ => panic!("expected jobs connect"),
        }
    }

    #[test]
    fn cli_parses_config_rm_by_index() {
        let cli = Cli::parse_from(["jut", "config", "rm", "2"]);
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Rm { configuration },
            } => assert_eq!(configuration, Selector::Index(2)),
            _ => panic!("expected config rm"),
        }
    }

    #[test]
    fn cli_respects_home_flag() {
        let cli = Cli::parse_from(["jut", "--home", "/tmp/jut", "config", "list"]);
        assert_eq!(cli.home.as_deref(), Some(std::path::Path::new("/tmp/jut")));
    }

    #[tokio::test]
    async fn run_without_configuration_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let home = dir.path().to_str().unwrap();
        let cli = Cli::parse_from(["jut", "--home", home, "jobs", "list"]);
        assert!(matches!(run(cli).await, Err(CliError::Config(_))));
    }
}
