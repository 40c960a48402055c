//! File-backed token store
//!
//! Persists the token as a small JSON document:
//!
//! ```json
//! {
//!   "updatedAt": "2024-03-01T10:00:00Z",
//!   "access_token": "...",
//!   "expires_in": 3600.0,
//!   "token_type": "Bearer"
//! }
//! ```
//!
//! A missing file means the store was never initialized. A file that does
//! not decode reads the same way, so the next renew overwrites it. Writes go
//! to a sibling temp file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::TokenStoreError;
use super::traits::TokenStore;
use super::types::{TokenField, TokenFields, TokenRecord};
use crate::time::{system_clock, SharedClock};

const RECOGNIZED: &[TokenField] =
    &[TokenField::AccessToken, TokenField::ExpiresIn, TokenField::TokenType];

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredToken {
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
}

impl StoredToken {
    fn into_record(self) -> TokenRecord {
        let mut record = TokenRecord {
            access_token: self.access_token,
            token_type: self.token_type,
            updated_at: self.updated_at,
            ..TokenRecord::default()
        };
        if let (Some(seconds), Some(updated_at)) = (self.expires_in, self.updated_at) {
            record.set_expires_in(seconds, updated_at);
        }
        record
    }
}

/// Token store persisted to a JSON file.
///
/// The refresh token is not a recognized key; the authority owns it.
pub struct PlainFileTokenStore {
    path: PathBuf,
    clock: SharedClock,
}

impl PlainFileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, system_clock())
    }

    #[must_use]
    pub fn with_clock(path: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self { path: path.into(), clock }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw persisted document, `None` when the file does not exist.
    ///
    /// # Errors
    /// Fails with `Io` on read errors and `Corrupt` when the file is not a
    /// JSON object.
    pub async fn load_raw(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>, TokenStoreError> {
        let Some(contents) = self.read().await? else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| TokenStoreError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    async fn read(&self) -> Result<Option<String>, TokenStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read token file");
                Err(e.into())
            }
        }
    }

    async fn load(&self) -> Result<Option<TokenRecord>, TokenStoreError> {
        let Some(contents) = self.read().await? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredToken>(&contents) {
            Ok(stored) => Ok(Some(stored.into_record())),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "undecodable token file, treating as empty");
                Ok(None)
            }
        }
    }

    async fn save(&self, stored: &StoredToken) -> Result<(), TokenStoreError> {
        let json = serde_json::to_string_pretty(stored)
            .map_err(|e| TokenStoreError::Io(format!("failed to encode token file: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl std::fmt::Debug for PlainFileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainFileTokenStore").field("path", &self.path).finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for PlainFileTokenStore {
    fn recognized_fields(&self) -> &'static [TokenField] {
        RECOGNIZED
    }

    async fn renew(&self, fields: TokenFields) -> Result<(), TokenStoreError> {
        let fields = fields.retain(RECOGNIZED);
        let stored = StoredToken {
            updated_at: Some(self.clock.now()),
            access_token: fields.access_token,
            expires_in: fields.expires_in.filter(|s| s.is_finite() && *s >= 0.0),
            token_type: fields.token_type,
        };
        self.save(&stored).await?;
        debug!(path = %self.path.display(), "token file renewed");
        Ok(())
    }

    async fn access_token(&self) -> Result<Option<String>, TokenStoreError> {
        let now = self.clock.now();
        Ok(self.load().await?.and_then(|record| record.fresh_access_token(now).map(str::to_string)))
    }

    async fn token_type(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.load().await?.and_then(|record| record.token_type))
    }

    async fn updated_at(&self) -> Result<Option<DateTime<Utc>>, TokenStoreError> {
        Ok(self.load().await?.and_then(|record| record.updated_at))
    }

    async fn is_expired(&self) -> Result<bool, TokenStoreError> {
        let now = self.clock.now();
        Ok(self.load().await?.map_or(true, |record| record.is_expired(now)))
    }
}
