//! OAuth 2.0 client for the refresh-token grant
//!
//! Performs the `grant_type=refresh_token` form POST against
//! `base_site + access_token_path` and parses the token response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokenrelay_domain::OAuthSettings;
use tracing::debug;

use super::traits::OAuthClientTrait;
use super::types::{OAuthError, TokenResponse};

/// Upper bound on one token-endpoint round-trip.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed
    RequestFailed(reqwest::Error),

    /// OAuth server returned a standard error body
    OAuthError { status: u16, error: OAuthError },

    /// Non-success status without a parseable OAuth error body
    HttpStatus { status: u16, body: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::OAuthError { status, error } => write!(f, "OAuth error ({status}): {error}"),
            Self::HttpStatus { status, body } => {
                write!(f, "token endpoint returned {status}: {body}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RequestFailed(e) => Some(e),
            Self::OAuthError { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 client for confidential clients holding a refresh token.
///
/// Implements the refresh grant of RFC 6749 §6. Client credentials travel in
/// the form body together with the redirect URI, which some providers insist
/// on even for non-interactive grants.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    settings: OAuthSettings,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client with the given settings
    ///
    /// # Errors
    /// Returns `ConfigError` when the HTTP client cannot be built.
    ///
    /// # Examples
    /// ```
    /// use tokenrelay_common::auth::OAuthClient;
    /// use tokenrelay_domain::OAuthSettings;
    ///
    /// let settings = OAuthSettings::new(
    ///     "client_id".to_string(),
    ///     "client_secret".to_string(),
    ///     "https://auth.example.com".to_string(),
    /// );
    /// let client = OAuthClient::new(settings).unwrap();
    /// assert_eq!(client.token_url(), "https://auth.example.com/oauth/token");
    /// ```
    pub fn new(settings: OAuthSettings) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OAuthClientError::ConfigError(e.to_string()))?;
        Ok(Self { settings, client })
    }

    /// Reuse an existing connection pool.
    #[must_use]
    pub fn with_http_client(settings: OAuthSettings, client: Client) -> Self {
        Self { settings, client }
    }

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - The endpoint is unreachable
    /// - The server rejects the grant
    /// - The response is not a token response
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let url = self.token_url();
        debug!(url = %url, client_id = %self.settings.client_id, "posting refresh grant");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OAuthError>(&body) {
                Ok(error) => OAuthClientError::OAuthError { status: status.as_u16(), error },
                Err(_) => OAuthClientError::HttpStatus { status: status.as_u16(), body },
            });
        }

        serde_json::from_str(&body).map_err(|e| OAuthClientError::ParseError(e.to_string()))
    }

    /// `base_site + access_token_path`
    #[must_use]
    pub fn token_url(&self) -> String {
        self.settings.token_url()
    }

    /// `base_site + authorize_path`
    #[must_use]
    pub fn authorization_url(&self) -> String {
        self.settings.authorization_url()
    }

    /// Get the configured redirect URI
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.settings.redirect_uri
    }

    #[must_use]
    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uri()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings_for(server: &MockServer) -> OAuthSettings {
        OAuthSettings::new("client-1".to_string(), "s3cret".to_string(), server.uri())
    }

    /// Validates `OAuthClient::refresh_access_token` sends the refresh grant.
    ///
    /// Assertions:
    /// - The form body carries grant type, client credentials, refresh token
    ///   and redirect URI.
    /// - The parsed response exposes the new access token and lifetime.
    #[tokio::test]
    async fn test_refresh_posts_form_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=s3cret"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%3A4321"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-1",
                "expires_in": 3600,
                "scope": "all"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(settings_for(&server)).unwrap();
        let response = client.refresh_access_token("rt-1").await.unwrap();

        assert_eq!(response.access_token, "at-1");
        assert_eq!(response.expires_in, Some(json!(3600)));
        assert_eq!(response.refresh_token, None);
    }

    /// Validates a standard OAuth error body is surfaced with its status.
    #[tokio::test]
    async fn test_refresh_surfaces_oauth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "expired"
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(settings_for(&server)).unwrap();
        let err = client.refresh_access_token("rt-1").await.unwrap_err();

        match err {
            OAuthClientError::OAuthError { status, error } => {
                assert_eq!(status, 400);
                assert_eq!(error.error, "invalid_grant");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Validates a non-JSON failure keeps the raw body.
    #[tokio::test]
    async fn test_refresh_non_json_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = OAuthClient::new(settings_for(&server)).unwrap();
        let err = client.refresh_access_token("rt-1").await.unwrap_err();

        assert!(
            matches!(err, OAuthClientError::HttpStatus { status: 502, ref body } if body == "bad gateway")
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = OAuthClient::new(settings_for(&server)).unwrap();
        let err = client.refresh_access_token("rt-1").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::ParseError(_)));
    }

    /// Validates an empty refresh token never reaches the network.
    #[tokio::test]
    async fn test_refresh_requires_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let client = OAuthClient::new(settings_for(&server)).unwrap();
        let err = client.refresh_access_token("").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::NoRefreshToken));
    }

    #[test]
    fn test_urls_and_redirect() {
        let mut settings = OAuthSettings::new(
            "id".to_string(),
            "secret".to_string(),
            "https://secure.example.com".to_string(),
        );
        settings.redirect_uri = "https://app.example.com/cb".to_string();
        let client = OAuthClient::new(settings).unwrap();

        assert_eq!(client.authorization_url(), "https://secure.example.com/oauth/authorize");
        assert_eq!(client.token_url(), "https://secure.example.com/oauth/token");
        assert_eq!(OAuthClientTrait::redirect_uri(&client), "https://app.example.com/cb");
    }
}
