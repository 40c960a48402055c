//! API client facade
//!
//! Wires configuration, the token lifecycle and the retrying executor into
//! one object. Operations are addressed by id when an API description is
//! attached; raw [`ApiRequest`]s go straight to the executor.

use std::sync::Arc;

use serde_json::Value;
use tokenrelay_common::auth::{AccessTokenProvider, CredentialSource, TokenAuthority, TokenStore};
use tokenrelay_domain::{ClientConfig, RetrySettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::errors::{ApiError, SpecError};
use super::executor::{ExecOutput, RequestExecutor};
use super::request::ApiRequest;
use super::spec::{ApiSpec, OperationRequest};
use crate::http::{HttpTransport, Transport};

/// Credential-refreshing API client.
pub struct ApiClient {
    executor: RequestExecutor,
    spec: Option<Arc<ApiSpec>>,
    base_url: Option<String>,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Build the full stack from resolved configuration.
    ///
    /// The authority is seeded from `config.oauth.refresh_token`, and the
    /// API description is loaded when `config.spec_location` is set.
    ///
    /// # Errors
    /// - `ApiError::Auth` when the OAuth HTTP client cannot be built
    /// - `ApiError::Spec` when the API description cannot be loaded
    /// - `ApiError::Config` when the transport cannot be built
    pub async fn from_config(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ApiError> {
        let authority = Arc::new(TokenAuthority::from_settings(&config.oauth, Arc::clone(&store))?);
        let provider = AccessTokenProvider::new(store, authority);

        let transport = HttpTransport::builder()
            .timeout(config.retry.request_timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build transport: {e}")))?;

        let mut builder = Self::builder()
            .transport(Arc::new(transport))
            .credentials(Arc::new(provider))
            .retry(config.retry);
        if let Some(base_url) = config.api_base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(location) = config.spec_location.as_deref() {
            builder = builder.spec(ApiSpec::load(location).await?);
        }

        let client = builder.build()?;
        info!(
            operations = client.spec.as_ref().map_or(0, |spec| spec.operations().len()),
            "API client ready"
        );
        Ok(client)
    }

    /// Operation ids of the attached API description, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<&str> {
        self.spec.as_ref().map(|spec| spec.operations()).unwrap_or_default()
    }

    #[must_use]
    pub fn spec(&self) -> Option<&ApiSpec> {
        self.spec.as_deref()
    }

    #[must_use]
    pub const fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Resolve `operation` against the API description and execute it.
    ///
    /// # Errors
    /// - `ApiError::Spec` when no description is attached or resolution fails
    /// - `ApiError::Exec` for terminal executor outcomes
    #[instrument(skip(self, operation), fields(operation = %operation.operation_id))]
    pub async fn call(&self, operation: &OperationRequest) -> Result<ExecOutput, ApiError> {
        let spec = self
            .spec
            .as_ref()
            .ok_or_else(|| SpecError::UnknownOperation(operation.operation_id.clone()))?;
        let request = spec.resolve(operation, self.base_url.as_deref())?;

        debug!(method = %request.method, url = %request.url, "operation resolved");
        self.execute(&request).await
    }

    /// Execute a prepared request.
    ///
    /// # Errors
    /// Returns `ApiError::Exec` for terminal executor outcomes.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ExecOutput, ApiError> {
        Ok(self.executor.execute(request).await?)
    }

    /// Execute and return the JSON payload; a passed-through 404 yields
    /// `None`.
    ///
    /// # Errors
    /// See [`ApiClient::call`].
    pub async fn call_json(&self, operation: &OperationRequest) -> Result<Option<Value>, ApiError> {
        Ok(self.call(operation).await?.into_payload())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("executor", &self.executor)
            .field("operations", &self.operations().len())
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialSource>>,
    retry: Option<RetrySettings>,
    spec: Option<ApiSpec>,
    base_url: Option<String>,
    cancel: Option<CancellationToken>,
}

impl ApiClientBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the credential source (usually an [`AccessTokenProvider`])
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub const fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn spec(mut self, spec: ApiSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Override the server address declared by the API description
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the API client
    ///
    /// Without an explicit transport a reqwest transport is built with the
    /// retry settings' request timeout.
    ///
    /// # Errors
    /// Returns `ApiError::Config` when credentials are missing or the default
    /// transport cannot be built.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let credentials = self
            .credentials
            .ok_or_else(|| ApiError::Config("Credential source not set".to_string()))?;
        let retry = self.retry.unwrap_or_default();

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::builder()
                    .timeout(retry.request_timeout())
                    .build()
                    .map_err(|e| ApiError::Config(format!("Failed to build transport: {e}")))?,
            ),
        };

        let mut executor = RequestExecutor::new(transport, credentials, retry);
        if let Some(token) = self.cancel {
            executor = executor.with_cancellation(token);
        }

        Ok(ApiClient { executor, spec: self.spec.map(Arc::new), base_url: self.base_url })
    }
}
