//! Environment discovery and deployment endpoint lookup.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::debug;

use crate::auth::authorized;
use crate::error::ClientError;
use crate::token::TokenManager;

/// Service URLs advertised by an app URL.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Environment {
    /// Auth service base URL.
    pub auth_url: String,
    /// Deployments API base URL.
    pub deployment_url: String,
}

/// Fetch `<app_url>/environment`.
///
/// # Errors
///
/// Returns [`ClientError::Api`] on a non-200 answer.
pub async fn fetch_environment(
    http: &reqwest::Client,
    app_url: &str,
) -> Result<Environment, ClientError> {
    let url = format!("{}/environment", app_url.trim_end_matches('/'));
    debug!(url = %url, "fetching environment");

    let response = http.get(&url).send().await?;
    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            status,
            message: format!("unable to retrieve environment details from {url}: {body}"),
        });
    }
    Ok(response.json().await?)
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    name: String,
    deployment_id: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentDetails {
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(rename = "type")]
    kind: String,
    uri: String,
}

/// Deployments API client.
#[derive(Debug, Clone)]
pub struct Deployments {
    http: reqwest::Client,
    deployment_url: String,
    tokens: Arc<TokenManager>,
}

impl Deployments {
    /// Create a client for `deployment_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, deployment_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            deployment_url: deployment_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Resolve a deployment name to its id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 if no deployment has
    /// that name.
    pub async fn deployment_id(&self, name: &str) -> Result<String, ClientError> {
        self.list()
            .await?
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.deployment_id)
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: format!("unable to find deployment with name {name}"),
            })
    }

    /// Names of every deployment visible to the account.
    pub async fn names(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.list().await?.into_iter().map(|d| d.name).collect())
    }

    async fn list(&self) -> Result<Vec<DeploymentEntry>, ClientError> {
        let url = format!("{}/api/v1/deployments", self.deployment_url);
        self.get_json(&url).await
    }

    /// Every juttle endpoint of a deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the deployment has no juttle
    /// endpoint.
    pub async fn juttle_data_urls(&self, name: &str) -> Result<Vec<String>, ClientError> {
        let id = self.deployment_id(name).await?;
        let url = format!("{}/api/v1/deployments/{id}", self.deployment_url);
        let details: DeploymentDetails = self.get_json(&url).await?;

        let urls: Vec<String> = details
            .endpoints
            .into_iter()
            .filter(|e| e.kind.contains("juttle"))
            .map(|e| e.uri)
            .collect();

        if urls.is_empty() {
            return Err(ClientError::Api {
                status: 404,
                message: format!("deployment {name} has no juttle endpoint"),
            });
        }
        debug!(deployment = %name, endpoints = urls.len(), "resolved juttle endpoints");
        Ok(urls)
    }

    /// One juttle endpoint of a deployment, picked at random.
    ///
    /// # Errors
    ///
    /// Same as [`juttle_data_urls`](Self::juttle_data_urls).
    pub async fn juttle_data_url(&self, name: &str) -> Result<String, ClientError> {
        let urls = self.juttle_data_urls(name).await?;
        urls.choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: format!("deployment {name} has no juttle endpoint"),
            })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let credential = self.tokens.get_credential().await?;
        let response = authorized(self.http.get(url), credential.token()).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        Ok(response.json().await?)
    }
}
