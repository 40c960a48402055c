//! Token authority: the refresh-token grant with single-flight coalescing
//!
//! The authority holds the refresh token, performs the exchange through an
//! [`OAuthClientTrait`] and commits the result to the shared [`TokenStore`].
//!
//! Concurrent `refresh()` calls share one exchange. Each caller notes the
//! completed-exchange generation before queueing on the flight guard; if the
//! generation moved while it waited, another caller already refreshed and the
//! stored outcome is returned instead of issuing a second round-trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokenrelay_domain::OAuthSettings;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::OAuthClient;
use super::error::AuthError;
use super::traits::{OAuthClientTrait, TokenRefresher, TokenStore};

/// Outcome of the most recent exchange, shared with queued callers.
#[derive(Debug, Default)]
struct FlightSlot {
    generation: u64,
    outcome: Option<Result<(), AuthError>>,
}

/// Performs the refresh grant and renews the shared store.
pub struct TokenAuthority {
    client: Arc<dyn OAuthClientTrait>,
    store: Arc<dyn TokenStore>,
    refresh_token: RwLock<Option<String>>,
    generation: AtomicU64,
    flight: Mutex<FlightSlot>,
}

impl TokenAuthority {
    /// Create an authority over `client` and `store`, seeded with
    /// `refresh_token`.
    #[must_use]
    pub fn new(
        client: Arc<dyn OAuthClientTrait>,
        store: Arc<dyn TokenStore>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            client,
            store,
            refresh_token: RwLock::new(refresh_token.filter(|token| !token.is_empty())),
            generation: AtomicU64::new(0),
            flight: Mutex::new(FlightSlot::default()),
        }
    }

    /// Build the reqwest-backed client from `settings` and seed the refresh
    /// token from `settings.refresh_token`.
    ///
    /// # Errors
    /// Returns `AuthError::Exchange` when the HTTP client cannot be built.
    pub fn from_settings(
        settings: &OAuthSettings,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let client = OAuthClient::new(settings.clone())?;
        Ok(Self::new(Arc::new(client), store, settings.refresh_token.clone()))
    }

    /// Refresh token used for the next exchange.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.read().clone()
    }

    /// Replace the refresh token, e.g. after an out-of-band authorization.
    pub fn set_refresh_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.refresh_token.write() = (!token.is_empty()).then_some(token);
    }

    /// Number of exchanges performed so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Obtain a new access token and commit it to the store.
    ///
    /// Callers that arrive while an exchange is in flight receive that
    /// exchange's outcome.
    ///
    /// # Errors
    /// - `NoRefreshToken` when no refresh token is held
    /// - `Exchange` when the token endpoint rejects the grant
    /// - `Store` when the store cannot be renewed
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut slot = self.flight.lock().await;

        if slot.generation != observed {
            debug!(generation = slot.generation, "joining completed token refresh");
            return slot.outcome.clone().unwrap_or(Ok(()));
        }

        let outcome = self.exchange().await;
        slot.generation = observed + 1;
        slot.outcome = Some(outcome.clone());
        self.generation.store(slot.generation, Ordering::Release);
        outcome
    }

    async fn exchange(&self) -> Result<(), AuthError> {
        let refresh_token = self.refresh_token().ok_or(AuthError::NoRefreshToken)?;

        info!(redirect_uri = self.client.redirect_uri(), "refreshing access token");
        let response = self.client.refresh_access_token(&refresh_token).await.map_err(|e| {
            warn!(error = %e, "token exchange failed");
            AuthError::from(e)
        })?;

        let fields = response.into_fields(&refresh_token);
        let rotated = fields.refresh_token.clone();
        let expires_in = fields.expires_in;

        self.store.renew(fields).await.map_err(|e| {
            warn!(error = %e, "failed to renew token store");
            AuthError::from(e)
        })?;

        if let Some(token) = rotated.filter(|token| *token != refresh_token) {
            debug!("refresh token rotated");
            *self.refresh_token.write() = Some(token);
        }

        info!(expires_in = ?expires_in, "access token refreshed");
        Ok(())
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("has_refresh_token", &self.refresh_token.read().is_some())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for TokenAuthority {
    async fn refresh(&self) -> Result<(), AuthError> {
        Self::refresh(self).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::authority.
    use std::time::Duration;

    use super::*;
    use crate::auth::error::TokenStoreError;
    use crate::auth::store::{MemoryTokenStore, StrictTokenStore};
    use crate::auth::types::TokenResponse;
    use crate::testing::MockOAuthClient;

    fn authority(client: Arc<MockOAuthClient>, store: Arc<dyn TokenStore>) -> TokenAuthority {
        TokenAuthority::new(client, store, Some("rt-0".to_string()))
    }

    /// Validates a refresh renews the store and re-asserts the used token.
    ///
    /// Assertions:
    /// - The store holds the issued access token and default token type.
    /// - The refresh token stays the seeded one when the server omits it.
    #[tokio::test]
    async fn test_refresh_renews_store() {
        let client = Arc::new(MockOAuthClient::new());
        client.push_response(TokenResponse {
            access_token: "at-1".to_string(),
            refresh_token: None,
            token_type: None,
            expires_in: Some(serde_json::json!(3600)),
        });
        let store = Arc::new(MemoryTokenStore::new());
        let authority = authority(client.clone(), store.clone());

        authority.refresh().await.unwrap();

        let record = store.snapshot();
        assert_eq!(record.access_token.as_deref(), Some("at-1"));
        assert_eq!(record.token_type.as_deref(), Some("Bearer"));
        assert_eq!(record.refresh_token.as_deref(), Some("rt-0"));
        assert_eq!(record.expires_in, Some(3600.0));
        assert_eq!(authority.refresh_token().as_deref(), Some("rt-0"));
        assert_eq!(client.seen_refresh_tokens(), ["rt-0"]);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_used_next() {
        let client = Arc::new(MockOAuthClient::new());
        client.push_response(TokenResponse {
            refresh_token: Some("rt-1".to_string()),
            ..TokenResponse::new("at-1", 60)
        });
        let authority = authority(client.clone(), Arc::new(MemoryTokenStore::new()));

        authority.refresh().await.unwrap();
        authority.refresh().await.unwrap();

        assert_eq!(authority.refresh_token().as_deref(), Some("rt-1"));
        assert_eq!(client.seen_refresh_tokens(), ["rt-0", "rt-1"]);
        assert_eq!(authority.generation(), 2);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_network() {
        let client = Arc::new(MockOAuthClient::new());
        let authority = TokenAuthority::new(client.clone(), Arc::new(MemoryTokenStore::new()), None);

        assert_eq!(authority.refresh().await, Err(AuthError::NoRefreshToken));
        assert_eq!(client.calls(), 0);

        authority.set_refresh_token("rt-late");
        authority.refresh().await.unwrap();
        assert_eq!(client.seen_refresh_tokens(), ["rt-late"]);
    }

    /// Validates a rejected grant propagates and leaves the store untouched.
    #[tokio::test]
    async fn test_rejected_grant_propagates() {
        let client = Arc::new(MockOAuthClient::new());
        client.push_rejection(400, "invalid_grant");
        let store = Arc::new(MemoryTokenStore::new());
        let authority = authority(client, store.clone());

        let err = authority.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::Exchange { status: Some(400), .. }));
        assert_eq!(store.snapshot().updated_at, None);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let client = Arc::new(MockOAuthClient::new());
        let authority = authority(client, Arc::new(StrictTokenStore));

        let err = authority.refresh().await.unwrap_err();
        assert_eq!(err, AuthError::Store(TokenStoreError::NotImplemented { operation: "renew" }));
        assert!(err.is_fatal());
    }

    /// Validates concurrent refreshes share one exchange.
    ///
    /// Assertions:
    /// - Eight concurrent callers all succeed.
    /// - The OAuth client is hit exactly once.
    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce() {
        let client = Arc::new(MockOAuthClient::new().with_delay(Duration::from_millis(50)));
        let authority = Arc::new(authority(client.clone(), Arc::new(MemoryTokenStore::new())));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let authority = authority.clone();
                tokio::spawn(async move { authority.refresh().await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(client.calls(), 1);
        assert_eq!(authority.generation(), 1);
    }

    #[tokio::test]
    async fn test_coalesced_callers_share_failure() {
        let client = Arc::new(MockOAuthClient::new().with_delay(Duration::from_millis(50)));
        client.push_rejection(401, "invalid_client");
        let authority = Arc::new(authority(client.clone(), Arc::new(MemoryTokenStore::new())));

        let first = tokio::spawn({
            let authority = authority.clone();
            async move { authority.refresh().await }
        });
        let second = tokio::spawn({
            let authority = authority.clone();
            async move { authority.refresh().await }
        });

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert!(first.is_err());
        assert_eq!(first, second);
        assert_eq!(client.calls(), 1);
    }
}
