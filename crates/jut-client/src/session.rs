//! Wiring of the REST collaborators for one app URL.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::auth::{AuthProvider, ClientCredentials};
use crate::deployments::{fetch_environment, Deployments, Environment};
use crate::error::ClientError;
use crate::jobs::HttpJobs;
use crate::token::TokenManager;

/// Timeout for individual REST calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared clients for one configured account.
#[derive(Debug, Clone)]
pub struct Session {
    tokens: Arc<TokenManager>,
    deployments: Deployments,
    jobs: HttpJobs,
}

impl Session {
    /// Discover the environment behind `app_url` and authenticate with
    /// client credentials.
    ///
    /// No token is requested until the first call that needs one.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the
    /// environment lookup fails.
    pub async fn connect(
        app_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jut/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;

        let environment = fetch_environment(&http, app_url).await?;
        debug!(
            auth_url = %environment.auth_url,
            deployment_url = %environment.deployment_url,
            "environment resolved"
        );

        let provider = Arc::new(ClientCredentials::new(
            http.clone(),
            environment.auth_url.clone(),
            client_id,
            client_secret,
        ));
        Ok(Self::assemble(http, &environment, provider))
    }

    fn assemble(
        http: reqwest::Client,
        environment: &Environment,
        provider: Arc<dyn AuthProvider>,
    ) -> Self {
        let tokens = Arc::new(TokenManager::new(provider));
        let deployments = Deployments::new(
            http.clone(),
            environment.deployment_url.clone(),
            Arc::clone(&tokens),
        );
        let jobs = HttpJobs::new(http, Arc::clone(&tokens));
        Self {
            tokens,
            deployments,
            jobs,
        }
    }

    /// Shared credential cache.
    #[must_use]
    pub fn tokens(&self) -> Arc<TokenManager> {
        Arc::clone(&self.tokens)
    }

    /// Deployments client.
    #[must_use]
    pub const fn deployments(&self) -> &Deployments {
        &self.deployments
    }

    /// Jobs client.
    #[must_use]
    pub const fn jobs(&self) -> &HttpJobs {
        &self.jobs
    }
}
