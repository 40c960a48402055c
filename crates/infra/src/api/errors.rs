//! API-specific error types
//!
//! Classifies transport and credential failures for the retry loop and
//! carries the original request descriptor into terminal errors.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokenrelay_common::auth::AuthError;
use tokenrelay_domain::TokenRelayError;

use super::request::ApiRequest;

/// Failure of one transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status { status: u16, headers: BTreeMap<String, String>, body: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built (bad URL, bad header).
    #[error("Invalid request: {0}")]
    Build(String),
}

impl TransportError {
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How the retry loop treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 401: refresh the credential, then retry.
    Unauthorized,
    /// 404: governed by the not-found policy, never retried.
    NotFound,
    /// No response within the request timeout: retry without refresh.
    Timeout,
    /// Anything else: retry without refresh.
    Other,
}

/// Failure of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error(transparent)]
    Transport(TransportError),

    /// The credential could not be obtained while authorizing.
    #[error(transparent)]
    Auth(AuthError),
}

impl Failure {
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Transport(TransportError::Status { status: 401, .. }) => {
                FailureClass::Unauthorized
            }
            Self::Transport(TransportError::Status { status: 404, .. }) => FailureClass::NotFound,
            Self::Transport(TransportError::Timeout(_)) => FailureClass::Timeout,
            Self::Transport(_) | Self::Auth(_) => FailureClass::Other,
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status(),
            Self::Auth(_) => None,
        }
    }

    /// Response headers, when the server answered at all.
    #[must_use]
    pub const fn response_headers(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Transport(TransportError::Status { headers, .. }) => Some(headers),
            _ => None,
        }
    }
}

/// Terminal outcome of [`RequestExecutor::execute`](super::RequestExecutor::execute).
#[derive(Debug, Error)]
pub enum ExecError {
    /// The retry budget ran out; `source` is the last failure.
    #[error("{} {} failed after exhausting retries: {source}", .request.method, .request.url)]
    Exhausted { request: Box<ApiRequest>, source: Failure },

    /// 404 under the `Fail` not-found policy.
    #[error("{} {} returned 404", .request.method, .request.url)]
    NotFound { request: Box<ApiRequest>, body: String },

    /// The forced refresh after a 401 failed.
    #[error("credential refresh failed for {} {}: {source}", .request.method, .request.url)]
    Refresh { request: Box<ApiRequest>, source: AuthError },

    /// A credential failure that retrying cannot fix.
    #[error("credential unavailable for {} {}: {source}", .request.method, .request.url)]
    Fatal { request: Box<ApiRequest>, source: AuthError },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ExecError {
    /// The request as issued by the caller.
    #[must_use]
    pub fn request(&self) -> Option<&ApiRequest> {
        match self {
            Self::Exhausted { request, .. }
            | Self::NotFound { request, .. }
            | Self::Refresh { request, .. }
            | Self::Fatal { request, .. } => Some(request),
            Self::Cancelled => None,
        }
    }

    /// HTTP status of the last response, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { source, .. } => source.status(),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Classification of the last attempt.
    #[must_use]
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            Self::Exhausted { source, .. } => Some(source.class()),
            Self::NotFound { .. } => Some(FailureClass::NotFound),
            Self::Refresh { .. } => Some(FailureClass::Unauthorized),
            Self::Fatal { .. } | Self::Cancelled => None,
        }
    }
}

/// Failures resolving an operation against an API description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Failed to load API description from {location}: {message}")]
    Load { location: String, message: String },

    #[error("Invalid API description: {0}")]
    Invalid(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation {operation} requires path parameter `{name}`")]
    MissingPathParam { operation: String, name: String },

    #[error("No base URL for operation {0}; set api_base_url or declare a server")]
    NoBaseUrl(String),

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Errors surfaced by [`ApiClient`](super::ApiClient).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<TokenRelayError> for ApiError {
    fn from(err: TokenRelayError) -> Self {
        Self::Config(err.to_string())
    }
}
