//! Mock implementations of the auth traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{
    AuthError, Credential, CredentialSource, OAuthClientError, OAuthClientTrait, OAuthError,
    TokenResponse,
};

/// Scripted reply of [`MockOAuthClient`].
#[derive(Debug, Clone)]
enum Scripted {
    Issue(TokenResponse),
    Reject { status: u16, error: String },
}

/// Mock OAuth client.
///
/// Replies are taken from a queue; once it is empty every call issues
/// `refreshed-access-<n>` valid for an hour.
#[derive(Debug, Default)]
pub struct MockOAuthClient {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockOAuthClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every exchange.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: TokenResponse) {
        self.script.lock().push_back(Scripted::Issue(response));
    }

    /// Queue an OAuth error body with `status`.
    pub fn push_rejection(&self, status: u16, error: &str) {
        self.script.lock().push_back(Scripted::Reject { status, error: error.to_string() });
    }

    /// Number of exchanges attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order.
    #[must_use]
    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().push(refresh_token.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Issue(response)) => Ok(response),
            Some(Scripted::Reject { status, error }) => Err(OAuthClientError::OAuthError {
                status,
                error: OAuthError { error, error_description: None },
            }),
            None => Ok(TokenResponse::new(format!("refreshed-access-{n}"), 3600)),
        }
    }

    fn redirect_uri(&self) -> &str {
        "http://localhost:4321"
    }
}

/// Mock credential source for executor tests.
///
/// Every forced refresh rotates the token to `<base>-<n>`. Failures can be
/// queued for either operation.
#[derive(Debug)]
pub struct MockCredentialSource {
    base: String,
    current: Mutex<Credential>,
    access_failures: Mutex<VecDeque<AuthError>>,
    refresh_failures: Mutex<VecDeque<AuthError>>,
    accesses: AtomicUsize,
    refreshes: AtomicUsize,
}

impl MockCredentialSource {
    #[must_use]
    pub fn new(access_token: &str) -> Self {
        Self {
            base: access_token.to_string(),
            current: Mutex::new(Credential::new("Bearer", access_token)),
            access_failures: Mutex::new(VecDeque::new()),
            refresh_failures: Mutex::new(VecDeque::new()),
            accesses: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_access(&self, error: AuthError) {
        self.access_failures.lock().push_back(error);
    }

    pub fn fail_next_refresh(&self, error: AuthError) {
        self.refresh_failures.lock().push_back(error);
    }

    #[must_use]
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current(&self) -> Credential {
        self.current.lock().clone()
    }
}

#[async_trait]
impl CredentialSource for MockCredentialSource {
    async fn access_token(&self) -> Result<Credential, AuthError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let failure = self.access_failures.lock().pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.current()),
        }
    }

    async fn force_refresh(&self) -> Result<(), AuthError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        let failure = self.refresh_failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }
        self.current.lock().access_token = format!("{}-{n}", self.base);
        Ok(())
    }
}
