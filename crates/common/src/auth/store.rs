//! In-process token store variants
//!
//! - [`StrictTokenStore`] fails every operation; useful to prove a code path
//!   never touches token state.
//! - [`NullTokenStore`] remembers nothing, so every access triggers a refresh.
//! - [`MemoryTokenStore`] keeps a [`TokenRecord`] in process memory.
//!
//! The file-backed variant lives in [`super::file_store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokenrelay_domain::constants::DEFAULT_TOKEN_TYPE;
use tracing::debug;

use super::error::TokenStoreError;
use super::traits::TokenStore;
use super::types::{TokenField, TokenFields, TokenRecord};
use crate::time::{system_clock, SharedClock};

/// Store whose every operation reports `NotImplemented`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictTokenStore;

fn not_implemented<T>(operation: &'static str) -> Result<T, TokenStoreError> {
    Err(TokenStoreError::NotImplemented { operation })
}

#[async_trait]
impl TokenStore for StrictTokenStore {
    fn recognized_fields(&self) -> &'static [TokenField] {
        &[]
    }

    async fn renew(&self, _fields: TokenFields) -> Result<(), TokenStoreError> {
        not_implemented("renew")
    }

    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        not_implemented("access_token")
    }

    async fn token_type(&self) -> Result<Option<String>, TokenStoreError> {
        not_implemented("token_type")
    }

    async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, TokenStoreError> {
        not_implemented("updated_at")
    }

    async fn is_expired(&self) -> Result<bool, TokenStoreError> {
        not_implemented("is_expired")
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        not_implemented("clear")
    }
}

/// Store that accepts renewals and forgets them.
///
/// Reports an empty access token, the default token type and no update time,
/// so it always reads as expired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTokenStore;

#[async_trait]
impl TokenStore for NullTokenStore {
    fn recognized_fields(&self) -> &'static [TokenField] {
        TokenField::ALL
    }

    async fn renew(&self, _fields: TokenFields) -> Result<(), TokenStoreError> {
        Ok(())
    }

    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(Some(String::new()))
    }

    async fn token_type(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(Some(DEFAULT_TOKEN_TYPE.to_string()))
    }

    async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, TokenStoreError> {
        Ok(None)
    }
}

/// Token store held in process memory.
pub struct MemoryTokenStore {
    record: RwLock<TokenRecord>,
    clock: SharedClock,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self { record: RwLock::new(TokenRecord::default()), clock }
    }

    /// Copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> TokenRecord {
        self.record.read().clone()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.read();
        f.debug_struct("MemoryTokenStore")
            .field("has_access_token", &record.access_token.is_some())
            .field("expires_at", &record.expires_at)
            .field("updated_at", &record.updated_at)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn recognized_fields(&self) -> &'static [TokenField] {
        TokenField::ALL
    }

    async fn renew(&self, fields: TokenFields) -> Result<(), TokenStoreError> {
        let now = self.clock.now();
        let record = TokenRecord::renewed(fields.retain(self.recognized_fields()), now);
        debug!(expires_at = ?record.expires_at, "memory token store renewed");
        *self.record.write() = record;
        Ok(())
    }

    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        let now = self.clock.now();
        Ok(self.record.read().fresh_access_token(now).map(str::to_string))
    }

    async fn token_type(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.record.read().token_type.clone())
    }

    async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, TokenStoreError> {
        Ok(self.record.read().updated_at)
    }

    async fn is_expired(&self) -> Result<bool, TokenStoreError> {
        Ok(self.record.read().is_expired(self.clock.now()))
    }
}
