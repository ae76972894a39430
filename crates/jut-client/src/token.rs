//! Cached bearer credential with proactive refresh.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::auth::AuthProvider;
use crate::error::ClientError;

/// Lifetime assumed for a token whose response carries no `expires_in`.
pub const ASSUMED_TOKEN_TTL: Duration = Duration::from_secs(300);

/// A bearer token and the instant it stops being handed out.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Instant,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// The bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Instant after which the credential is refreshed.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Supplies a valid credential on demand.
///
/// A fetched token is treated as expired at half of its reported TTL so a
/// long stream never carries a token that lapses mid-flight. A response
/// without `expires_in` is given [`ASSUMED_TOKEN_TTL`]. Safe to share
/// across tasks; concurrent refreshes are collapsed into one request.
pub struct TokenManager {
    provider: Arc<dyn AuthProvider>,
    cached: Mutex<Option<Credential>>,
    refresh: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("cached", &self.cached.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager with an empty cache.
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Return the cached credential, or fetch a new one if it has expired.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError::Authentication`] from the provider without
    /// retrying.
    pub async fn get_credential(&self) -> Result<Credential, ClientError> {
        if let Some(credential) = self.fresh_cached() {
            return Ok(credential);
        }

        let _guard = self.refresh.lock().await;
        if let Some(credential) = self.fresh_cached() {
            return Ok(credential);
        }

        let token = self.provider.request_token().await?;
        let ttl = token
            .expires_in
            .map_or(ASSUMED_TOKEN_TTL, Duration::from_secs);
        let credential = Credential {
            token: token.access_token,
            expires_at: Instant::now() + ttl / 2,
        };
        debug!(ttl_secs = ttl.as_secs(), "access token refreshed");

        *self.cached.lock() = Some(credential.clone());
        Ok(credential)
    }

    /// Whether the next [`get_credential`](Self::get_credential) would fetch.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        !self
            .cached
            .lock()
            .as_ref()
            .is_some_and(|c| c.is_fresh(Instant::now()))
    }

    fn fresh_cached(&self) -> Option<Credential> {
        let now = Instant::now();
        self.cached
            .lock()
            .as_ref()
            .filter(|c| c.is_fresh(now))
            .cloned()
    }
}
