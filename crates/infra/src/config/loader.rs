//! Configuration loader
//!
//! Resolves a [`ClientConfig`] from four layers. For every field the first
//! layer that sets it wins:
//!
//! 1. explicit values passed by the caller
//! 2. environment variables
//! 3. a JSON or TOML file
//! 4. built-in fallbacks
//!
//! ## Environment Variables
//! - `TOKENRELAY_CLIENT_ID`, `TOKENRELAY_CLIENT_SECRET`: OAuth client
//!   credentials (required)
//! - `TOKENRELAY_BASE_SITE`: authorization server origin (required)
//! - `TOKENRELAY_REFRESH_TOKEN`: seed refresh token
//! - `TOKENRELAY_AUTHORIZE_PATH`, `TOKENRELAY_ACCESS_TOKEN_PATH`
//! - `TOKENRELAY_REDIRECT_URI`
//! - `TOKENRELAY_RETRY_BUDGET`, `TOKENRELAY_RETRY_WAIT_MS`,
//!   `TOKENRELAY_REQUEST_TIMEOUT_MS`
//! - `TOKENRELAY_NOT_FOUND_POLICY`: `pass_through` or `fail`
//! - `TOKENRELAY_API_BASE_URL`, `TOKENRELAY_SPEC_LOCATION`
//! - `TOKENRELAY_CONFIG`: path of the file layer
//!
//! The environment is read through a lookup function so tests never touch
//! process-global state.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokenrelay_domain::constants::{
    DEFAULT_ACCESS_TOKEN_PATH, DEFAULT_AUTHORIZE_PATH, DEFAULT_REDIRECT_URI,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_BUDGET, DEFAULT_RETRY_WAIT_UNIT_MS,
};
use tokenrelay_domain::{
    ClientConfig, NotFoundPolicy, OAuthSettings, Result, RetrySettings, TokenRelayError,
};

pub const ENV_CLIENT_ID: &str = "TOKENRELAY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TOKENRELAY_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "TOKENRELAY_REFRESH_TOKEN";
pub const ENV_BASE_SITE: &str = "TOKENRELAY_BASE_SITE";
pub const ENV_AUTHORIZE_PATH: &str = "TOKENRELAY_AUTHORIZE_PATH";
pub const ENV_ACCESS_TOKEN_PATH: &str = "TOKENRELAY_ACCESS_TOKEN_PATH";
pub const ENV_REDIRECT_URI: &str = "TOKENRELAY_REDIRECT_URI";
pub const ENV_RETRY_BUDGET: &str = "TOKENRELAY_RETRY_BUDGET";
pub const ENV_RETRY_WAIT_MS: &str = "TOKENRELAY_RETRY_WAIT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TOKENRELAY_REQUEST_TIMEOUT_MS";
pub const ENV_NOT_FOUND_POLICY: &str = "TOKENRELAY_NOT_FOUND_POLICY";
pub const ENV_API_BASE_URL: &str = "TOKENRELAY_API_BASE_URL";
pub const ENV_SPEC_LOCATION: &str = "TOKENRELAY_SPEC_LOCATION";
pub const ENV_CONFIG: &str = "TOKENRELAY_CONFIG";

/// Where a configuration value came from, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    Explicit,
    Environment,
    File,
    Fallback,
}

/// One configuration layer; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub base_site: Option<String>,
    pub authorize_path: Option<String>,
    pub access_token_path: Option<String>,
    pub redirect_uri: Option<String>,
    pub retry_budget: Option<u32>,
    pub retry_wait_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub not_found_policy: Option<NotFoundPolicy>,
    pub api_base_url: Option<String>,
    pub spec_location: Option<String>,
}

impl PartialConfig {
    /// Field-wise merge where `self` wins over `lower`.
    #[must_use]
    pub fn merge(self, lower: Self) -> Self {
        Self {
            client_id: self.client_id.or(lower.client_id),
            client_secret: self.client_secret.or(lower.client_secret),
            refresh_token: self.refresh_token.or(lower.refresh_token),
            base_site: self.base_site.or(lower.base_site),
            authorize_path: self.authorize_path.or(lower.authorize_path),
            access_token_path: self.access_token_path.or(lower.access_token_path),
            redirect_uri: self.redirect_uri.or(lower.redirect_uri),
            retry_budget: self.retry_budget.or(lower.retry_budget),
            retry_wait_ms: self.retry_wait_ms.or(lower.retry_wait_ms),
            request_timeout_ms: self.request_timeout_ms.or(lower.request_timeout_ms),
            not_found_policy: self.not_found_policy.or(lower.not_found_policy),
            api_base_url: self.api_base_url.or(lower.api_base_url),
            spec_location: self.spec_location.or(lower.spec_location),
        }
    }

    /// Built-in defaults. Credentials and `base_site` have none.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            authorize_path: Some(DEFAULT_AUTHORIZE_PATH.to_string()),
            access_token_path: Some(DEFAULT_ACCESS_TOKEN_PATH.to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            retry_budget: Some(DEFAULT_RETRY_BUDGET),
            retry_wait_ms: Some(DEFAULT_RETRY_WAIT_UNIT_MS),
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
            not_found_policy: Some(NotFoundPolicy::default()),
            ..Self::default()
        }
    }

    /// Environment layer read through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns `TokenRelayError::Config` when a numeric or policy variable
    /// cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            refresh_token: get(ENV_REFRESH_TOKEN),
            base_site: get(ENV_BASE_SITE),
            authorize_path: get(ENV_AUTHORIZE_PATH),
            access_token_path: get(ENV_ACCESS_TOKEN_PATH),
            redirect_uri: get(ENV_REDIRECT_URI),
            retry_budget: parse_var(ENV_RETRY_BUDGET, get(ENV_RETRY_BUDGET))?,
            retry_wait_ms: parse_var(ENV_RETRY_WAIT_MS, get(ENV_RETRY_WAIT_MS))?,
            request_timeout_ms: parse_var(ENV_REQUEST_TIMEOUT_MS, get(ENV_REQUEST_TIMEOUT_MS))?,
            not_found_policy: parse_var(ENV_NOT_FOUND_POLICY, get(ENV_NOT_FOUND_POLICY))?,
            api_base_url: get(ENV_API_BASE_URL),
            spec_location: get(ENV_SPEC_LOCATION),
        })
    }

    /// Environment layer from the process environment.
    ///
    /// # Errors
    /// See [`PartialConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Validate required fields and build the resolved configuration.
    ///
    /// # Errors
    /// Returns `TokenRelayError::Config` naming the first missing required
    /// field.
    pub fn into_config(self) -> Result<ClientConfig> {
        let fallback = Self::fallback();
        let merged = self.merge(fallback);

        let mut oauth = OAuthSettings::new(
            required(merged.client_id, "client_id")?,
            required(merged.client_secret, "client_secret")?,
            required(merged.base_site, "base_site")?,
        );
        if let Some(path) = merged.authorize_path {
            oauth.authorize_path = path;
        }
        if let Some(path) = merged.access_token_path {
            oauth.access_token_path = path;
        }
        if let Some(uri) = merged.redirect_uri {
            oauth.redirect_uri = uri;
        }
        oauth.refresh_token = merged.refresh_token;

        let defaults = RetrySettings::default();
        let retry = RetrySettings {
            budget: merged.retry_budget.unwrap_or(defaults.budget),
            wait_unit_ms: merged.retry_wait_ms.unwrap_or(defaults.wait_unit_ms),
            request_timeout_ms: merged.request_timeout_ms.unwrap_or(defaults.request_timeout_ms),
            not_found: merged.not_found_policy.unwrap_or(defaults.not_found),
        };

        Ok(ClientConfig {
            oauth,
            retry,
            api_base_url: merged.api_base_url,
            spec_location: merged.spec_location,
        })
    }
}

/// Merge layers by precedence and resolve.
///
/// Layers may be given in any order; ties keep their given order.
///
/// # Errors
/// Returns `TokenRelayError::Config` when a required field is set by no
/// layer.
pub fn resolve<I>(layers: I) -> Result<ClientConfig>
where
    I: IntoIterator<Item = (ConfigLayer, PartialConfig)>,
{
    let mut layers: Vec<_> = layers.into_iter().collect();
    layers.sort_by_key(|(layer, _)| *layer);

    layers
        .into_iter()
        .map(|(_, partial)| partial)
        .reduce(PartialConfig::merge)
        .unwrap_or_default()
        .into_config()
}

/// Load configuration from the process environment, an optional file and
/// the fallbacks, with `explicit` on top.
///
/// # Errors
/// See [`load_with`].
pub fn load(explicit: PartialConfig) -> Result<ClientConfig> {
    load_with(explicit, None, |key| std::env::var(key).ok())
}

/// Load configuration with an injected environment lookup.
///
/// The file layer is `config_file` when given, otherwise the path named by
/// `TOKENRELAY_CONFIG`, otherwise absent.
///
/// # Errors
/// Returns `TokenRelayError::Config` if:
/// - an environment variable has an invalid value
/// - the named config file is missing or malformed
/// - a required field is set by no layer
pub fn load_with<F>(
    explicit: PartialConfig,
    config_file: Option<&Path>,
    lookup: F,
) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file_path = config_file
        .map(Path::to_path_buf)
        .or_else(|| lookup(ENV_CONFIG).filter(|p| !p.trim().is_empty()).map(PathBuf::from));
    let environment = PartialConfig::from_lookup(&lookup)?;

    let mut layers = vec![(ConfigLayer::Explicit, explicit), (ConfigLayer::Environment, environment)];
    if let Some(path) = file_path {
        layers.push((ConfigLayer::File, load_from_file(&path)?));
    }

    let config = resolve(layers)?;
    tracing::debug!(
        base_site = %config.oauth.base_site,
        has_refresh_token = config.oauth.refresh_token.is_some(),
        retry_budget = config.retry.budget,
        "configuration resolved"
    );
    Ok(config)
}

/// Load one configuration layer from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TokenRelayError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        return Err(TokenRelayError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| TokenRelayError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<PartialConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TokenRelayError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TokenRelayError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TokenRelayError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| TokenRelayError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| TokenRelayError::Config(format!("Missing required setting: {field}")))
}
