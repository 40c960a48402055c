//! Token lifecycle shared by TokenRelay crates.
//!
//! - [`auth`]: token stores, the OAuth refresh client, the token authority and
//!   the access token provider
//! - [`time`]: injectable wall clock used for expiry bookkeeping
//! - `testing` (feature `test-utils`): mocks for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    AccessTokenProvider, AuthError, Credential, CredentialSource, TokenAuthority, TokenStore,
    TokenStoreError,
};
pub use time::{Clock, SharedClock, SystemClock};
