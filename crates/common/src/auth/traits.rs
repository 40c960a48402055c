//! Trait seams of the token lifecycle
//!
//! The store, the OAuth client and the refresher are injected so each layer
//! can be exercised against stubs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::OAuthClientError;
use super::error::{AuthError, TokenStoreError};
use super::types::{Credential, TokenField, TokenFields, TokenResponse};

/// Persistence contract for the current token.
///
/// Exactly one store instance is shared by the authority (writer) and the
/// provider (reader). Implementations must tolerate concurrent calls.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Keys this variant keeps; everything else passed to `renew` is dropped.
    fn recognized_fields(&self) -> &'static [TokenField];

    /// Replace stored state with `fields` and stamp the update time.
    /// An empty set clears the store.
    async fn renew(&self, fields: TokenFields) -> Result<(), TokenStoreError>;

    /// Current access token, `None` when absent or expired.
    async fn access_token(&self) -> Result<Option<String>, TokenStoreError>;

    async fn token_type(&self) -> Result<Option<String>, TokenStoreError>;

    /// Instant of the last renewal, `None` if never renewed.
    async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, TokenStoreError>;

    /// A store that was never renewed is expired.
    async fn is_expired(&self) -> Result<bool, TokenStoreError> {
        Ok(self.updated_at().await?.is_none())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        self.renew(TokenFields::default()).await
    }
}

/// Trait for the refresh-token grant against an authorization server
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Exchange `refresh_token` for a new access token
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError>;

    /// Get the configured redirect URI
    fn redirect_uri(&self) -> &str;
}

/// Obtains a new access token and commits it to the shared store.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// What the request executor needs from the credential path.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A usable credential, refreshing first when the stored one is empty or
    /// expired.
    async fn access_token(&self) -> Result<Credential, AuthError>;

    /// Refresh unconditionally. Called after the server rejects a credential
    /// the store still considers valid.
    async fn force_refresh(&self) -> Result<(), AuthError>;
}
