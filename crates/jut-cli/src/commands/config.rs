//! Config command implementation.

use std::io::Write;
use std::path::PathBuf;

use jut_client::Session;
use tracing::debug;

use crate::cli::{AddConfigArgs, ConfigCommands};
use crate::config::{ConfigStore, Configuration};
use crate::error::CliError;
use crate::output::{ConfigEntry, ConfigList, Message, OutputFormat};

/// Config command executor.
pub struct ConfigCommand {
    home: PathBuf,
}

impl ConfigCommand {
    /// Create a command operating on the store under `home`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Execute a config subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written, or the
    /// selected configuration does not exist.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        command: &ConfigCommands,
    ) -> Result<(), CliError> {
        let mut store = ConfigStore::load(&self.home)?;

        match command {
            ConfigCommands::List { format } => {
                let list = ConfigList {
                    configurations: store.configurations().iter().map(ConfigEntry::from).collect(),
                };
                OutputFormat::new(*format).write(writer, &list)?;
            }
            ConfigCommands::Add(args) => {
                let deployment = match &args.deployment {
                    Some(deployment) => deployment.clone(),
                    None => discover_deployment(args).await?,
                };
                let mut configuration = Configuration::new(
                    &args.username,
                    &args.app_url,
                    &args.client_id,
                    &args.client_secret,
                    deployment,
                );
                configuration.default = args.default;
                store.add(configuration)?;
                store.save()?;
                updated(writer, &store)?;
            }
            ConfigCommands::Rm { configuration } => {
                let removed = store.remove(configuration)?;
                store.save()?;
                debug!(name = %removed.name, "configuration removed");
                updated(writer, &store)?;
            }
            ConfigCommands::Default { configuration } => {
                let name = store.set_default(configuration)?.name.clone();
                store.save()?;
                debug!(name = %name, "default configuration changed");
                updated(writer, &store)?;
            }
        }
        Ok(())
    }
}

fn updated<W: Write>(writer: &mut W, store: &ConfigStore) -> Result<(), CliError> {
    let message = Message::new(format!("Configuration updated at {}", store.path().display()));
    OutputFormat::default().write(writer, &message)
}

/// The account's only deployment.
async fn discover_deployment(args: &AddConfigArgs) -> Result<String, CliError> {
    let session = Session::connect(&args.app_url, &args.client_id, &args.client_secret).await?;
    let names = session.deployments().names().await?;
    pick_deployment(names)
}

fn pick_deployment(mut names: Vec<String>) -> Result<String, CliError> {
    match names.len() {
        0 => Err(CliError::Config("the account has no deployments".into())),
        1 => Ok(names.remove(0)),
        _ => Err(CliError::InvalidArgument(format!(
            "the account has several deployments ({}), pick one with --deployment",
            names.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::config::Selector;
    use tempfile::TempDir;

    fn add_args(username: &str, default: bool) -> AddConfigArgs {
        AddConfigArgs {
            username: username.into(),
            app_url: "https://app.example.com".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            deployment: Some("prod".into()),
            default,
        }
    }

    async fn run(command: &ConfigCommand, sub: ConfigCommands) -> Result<String, CliError> {
        let mut out = Vec::new();
        command.execute(&mut out, &sub).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn add_list_default_rm() {
        let dir = TempDir::new().unwrap();
        let command = ConfigCommand::new(dir.path());

        let out = run(&command, ConfigCommands::Add(add_args("alice", false))).await.unwrap();
        assert!(out.starts_with("Configuration updated at "));
        run(&command, ConfigCommands::Add(add_args("bob", false))).await.unwrap();

        let out = run(&command, ConfigCommands::List { format: Format::Table }).await.unwrap();
        assert_eq!(
            out,
            "Current jut configurations:\n 1: alice@https://app.example.com (default)\n 2: bob@https://app.example.com\n"
        );

        run(&command, ConfigCommands::Default { configuration: Selector::Index(2) }).await.unwrap();
        let store = ConfigStore::load(dir.path()).unwrap();
        assert_eq!(store.default_configuration().unwrap().username, "bob");

        run(&command, ConfigCommands::Rm { configuration: Selector::Index(2) }).await.unwrap();
        let store = ConfigStore::load(dir.path()).unwrap();
        assert_eq!(store.configurations().len(), 1);
        assert_eq!(store.default_configuration().unwrap().username, "alice");
    }

    #[tokio::test]
    async fn list_json_omits_secrets() {
        let dir = TempDir::new().unwrap();
        let command = ConfigCommand::new(dir.path());
        run(&command, ConfigCommands::Add(add_args("alice", true))).await.unwrap();

        let out = run(&command, ConfigCommands::List { format: Format::Json }).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["configurations"][0]["username"], "alice");
        assert!(!out.contains("secret"));
    }

    #[tokio::test]
    async fn rm_unknown_fails() {
        let dir = TempDir::new().unwrap();
        let command = ConfigCommand::new(dir.path());
        let err = run(&command, ConfigCommands::Rm { configuration: Selector::Index(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn single_deployment_is_picked() {
        assert_eq!(pick_deployment(vec!["prod".into()]).unwrap(), "prod");
        assert!(pick_deployment(Vec::new()).is_err());

        let err = pick_deployment(vec!["a".into(), "b".into()]).unwrap_err();
        assert!(err.to_string().contains("a, b"));
    }
}
