//! Token lifecycle types
//!
//! Defines the credential handed to outbound requests, the field set accepted
//! by token stores, the derived token record with its expiry predicate, and
//! the token-endpoint response.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenrelay_domain::constants::DEFAULT_TOKEN_TYPE;

/// Authorization material attached to exactly one outbound request.
///
/// Built fresh from the token store on every access and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token_type: String,
    pub access_token: String,
}

impl Credential {
    #[must_use]
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { token_type: token_type.into(), access_token: access_token.into() }
    }

    /// Value of the `Authorization` header: `"<token_type> <access_token>"`.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Keys a token store may recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenField {
    AccessToken,
    RefreshToken,
    TokenType,
    ExpiresIn,
}

impl TokenField {
    /// Every field the token endpoint can hand us.
    pub const ALL: &'static [Self] =
        &[Self::AccessToken, Self::RefreshToken, Self::TokenType, Self::ExpiresIn];

    /// Wire/persistence key
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::TokenType => "token_type",
            Self::ExpiresIn => "expires_in",
        }
    }
}

/// Partial or complete set of token fields passed to `TokenStore::renew`.
///
/// An empty set clears the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Seconds to live, as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<f64>,
}

impl TokenFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.token_type.is_none()
            && self.expires_in.is_none()
    }

    /// Copy of `self` with every key outside `recognized` dropped.
    #[must_use]
    pub fn retain(&self, recognized: &[TokenField]) -> Self {
        let keep = |field: TokenField| recognized.contains(&field);
        Self {
            access_token: self.access_token.clone().filter(|_| keep(TokenField::AccessToken)),
            refresh_token: self.refresh_token.clone().filter(|_| keep(TokenField::RefreshToken)),
            token_type: self.token_type.clone().filter(|_| keep(TokenField::TokenType)),
            expires_in: self.expires_in.filter(|_| keep(TokenField::ExpiresIn)),
        }
    }
}

/// Derived token state held by a store.
///
/// "Expired" is computed from `updated_at` and `expires_at`, never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<f64>,
    /// Absolute instant derived from `updated_at + expires_in`.
    pub expires_at: Option<DateTime<Utc>>,
    /// Instant of the last renewal; `None` means never renewed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Record produced by a renewal at `now`.
    #[must_use]
    pub fn renewed(fields: TokenFields, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            access_token: fields.access_token,
            refresh_token: fields.refresh_token,
            token_type: fields.token_type,
            expires_in: None,
            expires_at: None,
            updated_at: Some(now),
        };
        if let Some(seconds) = fields.expires_in {
            record.set_expires_in(seconds, now);
        }
        record
    }

    /// Normalize a relative lifetime into `expires_at`, measured from `from`.
    ///
    /// Rejects NaN, infinities and negative values; on rejection the prior
    /// expiry state is left untouched and `None` is returned.
    pub fn set_expires_in(&mut self, seconds: f64, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        let lifetime = Duration::try_from_secs_f64(seconds).ok()?;
        let lifetime = chrono::Duration::from_std(lifetime).ok()?;
        let expires_at = from.checked_add_signed(lifetime)?;

        self.expires_in = Some(seconds);
        self.expires_at = Some(expires_at);
        Some(expires_at)
    }

    /// True when never renewed, when no lifetime is known, or when
    /// `now >= updated_at + expires_in`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.updated_at, self.expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at,
            _ => true,
        }
    }

    /// The access token, if present, non-empty and not expired at `now`.
    #[must_use]
    pub fn fresh_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.is_expired(now) {
            return None;
        }
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Seconds until expiry, negative once expired.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - now).num_seconds())
    }
}

/// Accept only JSON numbers that are finite and non-negative.
#[must_use]
pub fn parse_expires_in(value: &serde_json::Value) -> Option<f64> {
    value.as_f64().filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

/// Token endpoint response (RFC 6749 §5.1).
///
/// Provider-specific extras are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Kept raw so a non-numeric lifetime can be rejected instead of failing
    /// the whole response.
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: Some(DEFAULT_TOKEN_TYPE.to_string()),
            expires_in: Some(serde_json::Value::from(expires_in)),
        }
    }

    /// Fields to commit to the store after an exchange that used
    /// `used_refresh_token`.
    ///
    /// The used refresh token is re-asserted when the server omits one, and
    /// `token_type` falls back to the default scheme.
    #[must_use]
    pub fn into_fields(self, used_refresh_token: &str) -> TokenFields {
        let expires_in = self.expires_in.as_ref().and_then(parse_expires_in);
        TokenFields {
            access_token: Some(self.access_token),
            refresh_token: Some(
                self.refresh_token
                    .filter(|token| !token.is_empty())
                    .unwrap_or_else(|| used_refresh_token.to_string()),
            ),
            token_type: Some(
                self.token_type
                    .filter(|kind| !kind.is_empty())
                    .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            ),
            expires_in,
        }
    }
}

/// OAuth error response from authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
