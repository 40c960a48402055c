//! Retrying request executor
//!
//! Each logical call runs a small state machine:
//!
//! ```text
//! Authorizing ─► Calling ─► Success
//!                   │
//!                   ▼
//!               Classify ─► Terminal (404, fatal credential, no budget)
//!                   │
//!                   ▼
//!        (401: forced refresh) Retry(wait) ─► Authorizing
//! ```
//!
//! The wait before retry `n` (1-based) is `n * wait_unit`: each failure with
//! budget left decrements `remaining`, then sleeps
//! `max(1, budget - remaining) * wait_unit`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokenrelay_common::auth::{Credential, CredentialSource};
use tokenrelay_domain::constants::AUTHORIZATION_HEADER;
use tokenrelay_domain::{NotFoundPolicy, RetrySettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::errors::{ExecError, Failure, FailureClass, TransportError};
use super::request::{ApiRequest, ApiResponse};
use crate::http::Transport;

/// Successful outcome of one logical call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutput {
    /// Decoded body of a 2xx response.
    Payload(Value),
    /// Raw body of a 404 under the `PassThrough` policy.
    NotFound(String),
}

impl ExecOutput {
    /// The payload, or `None` for a passed-through 404.
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Self::Payload(value) => Some(value),
            Self::NotFound(_) => None,
        }
    }
}

/// Retry bookkeeping local to one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    budget: u32,
    remaining: u32,
    last_error: Option<FailureClass>,
}

impl RetryState {
    #[must_use]
    pub const fn new(budget: u32) -> Self {
        Self { budget, remaining: budget, last_error: None }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<FailureClass> {
        self.last_error
    }

    /// Record a failure and consume one retry.
    ///
    /// Returns the wait before the next attempt, or `None` when the budget
    /// is spent.
    pub fn consume(&mut self, class: FailureClass, unit: Duration) -> Option<Duration> {
        self.last_error = Some(class);
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(retry_wait(self.budget, self.remaining, unit))
    }
}

/// `max(1, budget - remaining) * unit`
#[must_use]
pub fn retry_wait(budget: u32, remaining: u32, unit: Duration) -> Duration {
    unit.saturating_mul(budget.saturating_sub(remaining).max(1))
}

/// Caller headers with `Authorization` set to `credential`.
///
/// Any existing `Authorization` entry is replaced regardless of case; other
/// headers are kept as given.
#[must_use]
pub fn authorize_headers(
    headers: &BTreeMap<String, String>,
    credential: &Credential,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    merged.insert(AUTHORIZATION_HEADER.to_string(), credential.authorization_value());
    merged
}

/// Wraps every call with credential injection, failure classification and
/// bounded retry.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    settings: RetrySettings,
    cancel: Option<CancellationToken>,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
        settings: RetrySettings,
    ) -> Self {
        Self { transport, credentials, settings, cancel: None }
    }

    /// Abort in-flight calls and retry waits when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Execute `request` with the configured retry budget.
    ///
    /// # Errors
    /// - `Exhausted` when every attempt failed; carries `request` unchanged
    ///   and the last failure
    /// - `NotFound` on 404 under the `Fail` policy
    /// - `Refresh` when the forced refresh after a 401 fails
    /// - `Fatal` when the credential store cannot serve at all
    /// - `Cancelled` when the cancellation token fires
    pub async fn execute(&self, request: &ApiRequest) -> Result<ExecOutput, ExecError> {
        self.execute_with_budget(request, self.settings.budget).await
    }

    /// Execute `request` with an explicit retry budget.
    ///
    /// # Errors
    /// See [`RequestExecutor::execute`].
    #[instrument(
        skip(self, request),
        fields(method = %request.method, url = %request.url, operation = ?request.operation_id)
    )]
    pub async fn execute_with_budget(
        &self,
        request: &ApiRequest,
        budget: u32,
    ) -> Result<ExecOutput, ExecError> {
        let mut state = RetryState::new(budget);

        loop {
            let failure = match self.cancellable(self.attempt(request)).await? {
                Ok(response) => {
                    debug!(status = response.status, "request succeeded");
                    return Ok(ExecOutput::Payload(response.payload()));
                }
                Err(failure) => failure,
            };

            if let Failure::Auth(source) = &failure {
                if source.is_fatal() {
                    warn!(error = %source, "credential store unusable");
                    return Err(ExecError::Fatal {
                        request: Box::new(request.clone()),
                        source: source.clone(),
                    });
                }
            }

            let class = failure.class();
            if class == FailureClass::NotFound {
                return self.not_found(request, failure);
            }

            let Some(wait) = state.consume(class, self.settings.wait_unit()) else {
                warn!(
                    query = ?request.query,
                    last_error = ?state.last_error(),
                    status = ?failure.status(),
                    error = %failure,
                    "retry budget exhausted"
                );
                return Err(ExecError::Exhausted { request: Box::new(request.clone()), source: failure });
            };

            warn!(
                query = ?request.query,
                remaining = state.remaining(),
                class = ?class,
                status = ?failure.status(),
                response_headers = ?failure.response_headers(),
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "request failed, retrying"
            );

            if class == FailureClass::Unauthorized {
                self.cancellable(self.credentials.force_refresh()).await?.map_err(|source| {
                    warn!(error = %source, "forced credential refresh failed");
                    ExecError::Refresh { request: Box::new(request.clone()), source }
                })?;
            }

            self.cancellable(tokio::time::sleep(wait)).await?;
        }
    }

    async fn attempt(&self, request: &ApiRequest) -> Result<ApiResponse, Failure> {
        let credential = self.credentials.access_token().await.map_err(Failure::Auth)?;

        let mut prepared = request.clone();
        prepared.headers = authorize_headers(&request.headers, &credential);

        let timeout = self.settings.request_timeout();
        let response = match tokio::time::timeout(timeout, self.transport.send(&prepared)).await {
            Ok(result) => result.map_err(Failure::Transport)?,
            Err(_) => return Err(Failure::Transport(TransportError::Timeout(timeout))),
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(Failure::Transport(TransportError::Status {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }))
        }
    }

    fn not_found(&self, request: &ApiRequest, failure: Failure) -> Result<ExecOutput, ExecError> {
        let body = match failure {
            Failure::Transport(TransportError::Status { body, .. }) => body,
            _ => String::new(),
        };
        match self.settings.not_found {
            NotFoundPolicy::PassThrough => {
                debug!("404 passed through to caller");
                Ok(ExecOutput::NotFound(body))
            }
            NotFoundPolicy::Fail => {
                Err(ExecError::NotFound { request: Box::new(request.clone()), body })
            }
        }
    }

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output, ExecError> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(ExecError::Cancelled),
                output = future => Ok(output),
            },
            None => Ok(future.await),
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("settings", &self.settings)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}
