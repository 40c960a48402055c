//! Defaults shared by the configuration loader and the executor.

/// Scheme used when the token endpoint omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Redirect URI sent with every refresh grant when none is configured.
/// Some authorization servers require it even for non-interactive grants.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:4321";
pub const DEFAULT_AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const DEFAULT_ACCESS_TOKEN_PATH: &str = "/oauth/token";

// Retry configuration
pub const DEFAULT_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_RETRY_WAIT_UNIT_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Header the executor injects on every outbound call.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
