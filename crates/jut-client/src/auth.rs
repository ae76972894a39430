//! Authentication collaborator.
//!
//! Tokens are obtained with the OAuth client-credentials grant from the
//! environment's auth service.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientError;

/// Token answer from the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer token.
    pub access_token: String,
    /// Token type; only `Bearer` is supported.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Source of fresh access tokens.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Request a new token. Never served from a cache.
    async fn request_token(&self) -> Result<AccessToken, ClientError>;
}

/// Client-credentials grant against `<auth_url>/token`.
pub struct ClientCredentials {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl ClientCredentials {
    /// Create a provider.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for ClientCredentials {
    async fn request_token(&self) -> Result<AccessToken, ClientError> {
        let url = format!("{}/token", self.auth_url);
        debug!(url = %url, client_id = %self.client_id, "requesting access token");

        let response = self
            .http
            .post(&url)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication { status, message });
        }

        let token: AccessToken = response.json().await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ClientError::Authentication {
                status,
                message: format!("token type not supported: {}", token.token_type),
            });
        }

        Ok(token)
    }
}

/// Attach the bearer headers every REST call carries.
pub(crate) fn authorized(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder.bearer_auth(token).header(ACCEPT, "application/json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn access_token_defaults() {
        let token: AccessToken = serde_json::from_str(r#"{"access_token": "t"}"#).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, None);
    }

    #[test]
    fn debug_hides_secret() {
        let provider = ClientCredentials::new(
            reqwest::Client::new(),
            "https://auth.example.com/",
            "id",
            "hunter2",
        );
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("https://auth.example.com"));
    }

    #[tokio::test]
    async fn request_token_posts_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_json(json!({
                "grant_type": "client_credentials",
                "client_id": "cid",
                "client_secret": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ClientCredentials::new(reqwest::Client::new(), server.uri(), "cid", "secret");
        let token = provider.request_token().await.unwrap();

        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn request_token_rejection_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
            .mount(&server)
            .await;

        let provider = ClientCredentials::new(reqwest::Client::new(), server.uri(), "cid", "bad");
        let err = provider.request_token().await.unwrap_err();

        match err {
            ClientError::Authentication { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid client");
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_bearer_tokens_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc",
                "token_type": "MAC"
            })))
            .mount(&server)
            .await;

        let provider = ClientCredentials::new(reqwest::Client::new(), server.uri(), "cid", "secret");
        let err = provider.request_token().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication { .. }));
    }
}
