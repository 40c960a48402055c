//! Access token provider
//!
//! Hands out a usable [`Credential`], refreshing through the authority when
//! the stored token is empty or expired.

use std::sync::Arc;

use async_trait::async_trait;
use tokenrelay_domain::constants::DEFAULT_TOKEN_TYPE;
use tracing::debug;

use super::error::AuthError;
use super::traits::{CredentialSource, TokenRefresher, TokenStore};
use super::types::Credential;

/// Reads the shared store and refreshes on demand.
///
/// Performs no retry of its own; a failed refresh is returned to the caller.
#[derive(Clone)]
pub struct AccessTokenProvider {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl AccessTokenProvider {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { store, refresher }
    }

    /// Current credential, refreshed first when needed.
    ///
    /// # Errors
    /// Propagates store and refresh failures, and returns
    /// `CredentialUnavailable` when the store is still empty after a refresh.
    pub async fn access_token(&self) -> Result<Credential, AuthError> {
        let current = self.store.access_token().await?;
        let empty = current.as_deref().map_or(true, str::is_empty);

        if empty || self.store.is_expired().await? {
            debug!(empty, "stored access token unusable, refreshing");
            self.refresher.refresh().await?;
        }

        let access_token = self
            .store
            .access_token()
            .await?
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::CredentialUnavailable)?;
        let token_type = self
            .store
            .token_type()
            .await?
            .filter(|kind| !kind.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        Ok(Credential { token_type, access_token })
    }
}

impl std::fmt::Debug for AccessTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialSource for AccessTokenProvider {
    async fn access_token(&self) -> Result<Credential, AuthError> {
        Self::access_token(self).await
    }

    async fn force_refresh(&self) -> Result<(), AuthError> {
        self.refresher.refresh().await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::provider.
    use std::time::Duration;

    use super::*;
    use crate::auth::authority::TokenAuthority;
    use crate::auth::store::{MemoryTokenStore, NullTokenStore};
    use crate::auth::types::{TokenFields, TokenResponse};
    use crate::testing::MockOAuthClient;
    use crate::time::MockClock;

    fn wire(
        client: &Arc<MockOAuthClient>,
        store: Arc<dyn TokenStore>,
    ) -> (AccessTokenProvider, Arc<TokenAuthority>) {
        let authority =
            Arc::new(TokenAuthority::new(client.clone(), store.clone(), Some("rt".to_string())));
        (AccessTokenProvider::new(store, authority.clone()), authority)
    }

    #[tokio::test]
    async fn test_fresh_token_is_returned_without_refresh() {
        let client = Arc::new(MockOAuthClient::new());
        let store = Arc::new(MemoryTokenStore::new());
        store
            .renew(TokenFields {
                access_token: Some("cached".to_string()),
                token_type: Some("MAC".to_string()),
                expires_in: Some(3600.0),
                ..TokenFields::default()
            })
            .await
            .unwrap();
        let (provider, _) = wire(&client, store);

        let credential = provider.access_token().await.unwrap();
        assert_eq!(credential, Credential::new("MAC", "cached"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_store_triggers_one_refresh() {
        let client = Arc::new(MockOAuthClient::new());
        client.push_response(TokenResponse::new("issued", 3600));
        let (provider, _) = wire(&client, Arc::new(MemoryTokenStore::new()));

        let credential = provider.access_token().await.unwrap();
        assert_eq!(credential.authorization_value(), "Bearer issued");
        assert_eq!(client.calls(), 1);

        provider.access_token().await.unwrap();
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_refresh() {
        let clock = Arc::new(MockClock::new());
        let client = Arc::new(MockOAuthClient::new());
        client.push_response(TokenResponse::new("first", 600));
        client.push_response(TokenResponse::new("second", 600));
        let (provider, _) = wire(&client, Arc::new(MemoryTokenStore::with_clock(clock.clone())));

        assert_eq!(provider.access_token().await.unwrap().access_token, "first");
        clock.advance(Duration::from_secs(620));
        assert_eq!(provider.access_token().await.unwrap().access_token, "second");
        assert_eq!(client.calls(), 2);
    }

    /// Validates a store that never keeps a token yields
    /// `CredentialUnavailable` after refreshing.
    #[tokio::test]
    async fn test_null_store_reports_unavailable() {
        let client = Arc::new(MockOAuthClient::new());
        let (provider, _) = wire(&client, Arc::new(NullTokenStore));

        assert_eq!(provider.access_token().await, Err(AuthError::CredentialUnavailable));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_propagated() {
        let client = Arc::new(MockOAuthClient::new());
        client.push_rejection(400, "invalid_grant");
        let (provider, _) = wire(&client, Arc::new(MemoryTokenStore::new()));

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Exchange { .. }));
    }

    #[tokio::test]
    async fn test_force_refresh_always_exchanges() {
        let client = Arc::new(MockOAuthClient::new());
        let (provider, authority) = wire(&client, Arc::new(MemoryTokenStore::new()));

        provider.access_token().await.unwrap();
        CredentialSource::force_refresh(&provider).await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(authority.generation(), 2);
    }
}
