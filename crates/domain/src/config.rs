//! Configuration structures
//!
//! `ClientConfig` is the fully resolved surface consumed by the token
//! authority and the request executor. Resolution (explicit values, the
//! environment, files, fallbacks) lives in `tokenrelay-infra`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_PATH, DEFAULT_AUTHORIZE_PATH, DEFAULT_REDIRECT_URI,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_BUDGET, DEFAULT_RETRY_WAIT_UNIT_MS,
};

/// What the executor does with an HTTP 404.
///
/// `PassThrough` hands the raw body back as a non-error result and leaves the
/// interpretation to the caller; `Fail` surfaces it as a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    #[default]
    PassThrough,
    Fail,
}

impl std::str::FromStr for NotFoundPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass_through" | "passthrough" | "pass-through" => Ok(Self::PassThrough),
            "fail" | "error" => Ok(Self::Fail),
            other => Err(format!("unknown not-found policy: {other}")),
        }
    }
}

/// OAuth settings needed by the refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization server origin, e.g. `https://auth.example.com`
    pub base_site: String,
    pub authorize_path: String,
    pub access_token_path: String,
    pub redirect_uri: String,
    /// Seed for every renewal. Kept out of the token store so a store
    /// `clear()` never strands the session.
    pub refresh_token: Option<String>,
}

impl OAuthSettings {
    #[must_use]
    pub fn new(client_id: String, client_secret: String, base_site: String) -> Self {
        Self {
            client_id,
            client_secret,
            base_site,
            authorize_path: DEFAULT_AUTHORIZE_PATH.to_string(),
            access_token_path: DEFAULT_ACCESS_TOKEN_PATH.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            refresh_token: None,
        }
    }

    /// `base_site` joined with `access_token_path`.
    #[must_use]
    pub fn token_url(&self) -> String {
        join_url(&self.base_site, &self.access_token_path)
    }

    /// `base_site` joined with `authorize_path`.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        join_url(&self.base_site, &self.authorize_path)
    }
}

/// Retry and timeout settings for the request executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Number of retries granted to one logical operation.
    pub budget: u32,
    pub wait_unit_ms: u64,
    pub request_timeout_ms: u64,
    pub not_found: NotFoundPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            budget: DEFAULT_RETRY_BUDGET,
            wait_unit_ms: DEFAULT_RETRY_WAIT_UNIT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            not_found: NotFoundPolicy::default(),
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn wait_unit(&self) -> Duration {
        Duration::from_millis(self.wait_unit_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub oauth: OAuthSettings,
    pub retry: RetrySettings,
    /// Overrides the server address found in the API description.
    pub api_base_url: Option<String>,
    /// Local path or `http(s)://` URL of the API description document.
    pub spec_location: Option<String>,
}

fn join_url(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base.trim_end_matches('/'), path),
        (false, false) if !path.is_empty() => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
