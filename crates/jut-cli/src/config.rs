//! Persistent configuration store.
//!
//! Configurations live in `<jut home>/config.toml` as an array of
//! `[[configuration]]` tables. Exactly one of them is the default once any
//! exist.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CliError;

/// App URL used when none is given.
pub const DEFAULT_APP_URL: &str = "https://app.jut.io";

/// File name inside the jut home directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Credentials and defaults for one account on one environment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// `username@app_url`.
    pub name: String,
    /// Account username.
    pub username: String,
    /// Environment app URL.
    pub app_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Deployment used when a command does not name one.
    pub deployment_name: String,
    /// Whether this is the default configuration.
    #[serde(default)]
    pub default: bool,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("name", &self.name)
            .field("deployment_name", &self.deployment_name)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// Create a non-default configuration named `username@app_url`.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        app_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        deployment_name: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let app_url = app_url.into();
        Self {
            name: format!("{username}@{app_url}"),
            username,
            app_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            deployment_name: deployment_name.into(),
            default: false,
        }
    }

    /// Label shown in listings; the app URL is elided for the public
    /// environment.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.app_url == DEFAULT_APP_URL {
            &self.username
        } else {
            &self.name
        }
    }
}

/// Picks a configuration by name or 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `username@app_url`.
    Name(String),
    /// Position in the listing, starting at 1.
    Index(usize),
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("configuration name or index required".into());
        }
        match s.parse::<usize>() {
            Ok(0) => Err("configuration indexes start at 1".into()),
            Ok(index) => Ok(Self::Index(index)),
            Err(_) => Ok(Self::Name(s.to_string())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, rename = "configuration")]
    configurations: Vec<Configuration>,
}

/// The on-disk set of configurations.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    configurations: Vec<Configuration>,
}

/// Resolve the jut home directory: `home` if given, otherwise `~/.jut`.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn jut_home(home: Option<&Path>) -> Result<PathBuf, CliError> {
    if let Some(home) = home {
        return Ok(home.to_path_buf());
    }
    dirs::home_dir()
        .map(|dir| dir.join(".jut"))
        .ok_or_else(|| CliError::Config("unable to determine home directory".into()))
}

impl ConfigStore {
    /// Load `<home>/config.toml`; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(home: &Path) -> Result<Self, CliError> {
        let path = home.join(CONFIG_FILE);
        let configurations = match fs::read_to_string(&path) {
            Ok(text) => {
                let file: ConfigFile = toml::from_str(&text).map_err(|e| {
                    CliError::Config(format!("invalid {}: {e}", path.display()))
                })?;
                file.configurations
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), count = configurations.len(), "loaded configurations");
        Ok(Self {
            path,
            configurations,
        })
    }

    /// Write the store back, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self) -> Result<(), CliError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = ConfigFile {
            configurations: self.configurations.clone(),
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| CliError::Format(format!("TOML serialization failed: {e}")))?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All configurations in listing order.
    #[must_use]
    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Whether nothing is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Add a configuration. The first one added becomes the default, as
    /// does any added with `default` set.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration with the same name exists.
    pub fn add(&mut self, mut configuration: Configuration) -> Result<(), CliError> {
        if self.configurations.iter().any(|c| c.name == configuration.name) {
            return Err(CliError::Config(format!(
                "configuration {} already exists",
                configuration.name
            )));
        }
        if self.configurations.is_empty() {
            configuration.default = true;
        }
        if configuration.default {
            for existing in &mut self.configurations {
                existing.default = false;
            }
        }
        self.configurations.push(configuration);
        Ok(())
    }

    /// Remove a configuration. If it was the default, the first remaining
    /// configuration becomes the default.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches `selector`.
    pub fn remove(&mut self, selector: &Selector) -> Result<Configuration, CliError> {
        let idx = self.position(selector)?;
        let removed = self.configurations.remove(idx);
        if removed.default {
            if let Some(first) = self.configurations.first_mut() {
                first.default = true;
            }
        }
        Ok(removed)
    }

    /// Make the selected configuration the only default.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches `selector`.
    pub fn set_default(&mut self, selector: &Selector) -> Result<&Configuration, CliError> {
        let idx = self.position(selector)?;
        for (i, configuration) in self.configurations.iter_mut().enumerate() {
            configuration.default = i == idx;
        }
        Ok(&self.configurations[idx])
    }

    /// The default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is configured.
    pub fn default_configuration(&self) -> Result<&Configuration, CliError> {
        self.configurations
            .iter()
            .find(|c| c.default)
            .or_else(|| self.configurations.first())
            .ok_or_else(|| {
                CliError::Config(
                    "no configurations available, please run `jut config add`".into(),
                )
            })
    }

    fn position(&self, selector: &Selector) -> Result<usize, CliError> {
        let found = match selector {
            Selector::Name(name) => self.configurations.iter().position(|c| &c.name == name),
            Selector::Index(index) => index
                .checked_sub(1)
                .filter(|&i| i < self.configurations.len()),
        };
        found.ok_or_else(|| CliError::Config(format!("unable to find configuration {selector}")))
    }
}
