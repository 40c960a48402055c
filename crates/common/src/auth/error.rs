//! Error types for the token lifecycle

use thiserror::Error;

use super::client::OAuthClientError;

/// Failures raised by a [`TokenStore`](super::TokenStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenStoreError {
    /// The store variant does not provide this operation. Never retried.
    #[error("token store operation `{operation}` is not implemented")]
    NotImplemented { operation: &'static str },

    #[error("token store I/O failed: {0}")]
    Io(String),

    /// Persisted state exists but cannot be decoded.
    #[error("token store contents are corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for TokenStoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Failures on the credential path (provider and authority).
///
/// `Clone` so one refresh outcome can be handed to every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Token endpoint rejected the grant or answered with something unusable.
    #[error("token exchange failed: {message}")]
    Exchange { status: Option<u16>, message: String },

    #[error(transparent)]
    Store(#[from] TokenStoreError),

    /// Refresh reported success but the store still holds no access token.
    #[error("no usable access token after refresh")]
    CredentialUnavailable,
}

impl AuthError {
    /// True when retrying cannot change the outcome.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(TokenStoreError::NotImplemented { .. }))
    }
}

impl From<OAuthClientError> for AuthError {
    fn from(err: OAuthClientError) -> Self {
        match err {
            OAuthClientError::NoRefreshToken => Self::NoRefreshToken,
            OAuthClientError::OAuthError { status, ref error } => {
                Self::Exchange { status: Some(status), message: error.to_string() }
            }
            OAuthClientError::HttpStatus { status, .. } => {
                Self::Exchange { status: Some(status), message: err.to_string() }
            }
            OAuthClientError::RequestFailed(ref source) => {
                Self::Exchange { status: source.status().map(|s| s.as_u16()), message: err.to_string() }
            }
            OAuthClientError::ParseError(_) | OAuthClientError::ConfigError(_) => {
                Self::Exchange { status: None, message: err.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::OAuthError;

    #[test]
    fn only_not_implemented_is_fatal() {
        assert!(AuthError::Store(TokenStoreError::NotImplemented { operation: "renew" }).is_fatal());
        assert!(!AuthError::Store(TokenStoreError::Io("disk".into())).is_fatal());
        assert!(!AuthError::NoRefreshToken.is_fatal());
        assert!(!AuthError::CredentialUnavailable.is_fatal());
    }

    #[test]
    fn oauth_error_maps_to_exchange_with_status() {
        let err = OAuthClientError::OAuthError {
            status: 400,
            error: OAuthError {
                error: "invalid_grant".to_string(),
                error_description: Some("refresh token revoked".to_string()),
            },
        };
        assert_eq!(
            AuthError::from(err),
            AuthError::Exchange {
                status: Some(400),
                message: "invalid_grant: refresh token revoked".to_string(),
            }
        );
        assert_eq!(AuthError::from(OAuthClientError::NoRefreshToken), AuthError::NoRefreshToken);
    }
}
