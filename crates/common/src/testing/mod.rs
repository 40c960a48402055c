//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scriptable stand-ins for the OAuth client and the
//!   credential source
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates.

pub mod mocks;

pub use mocks::{MockCredentialSource, MockOAuthClient};

pub use crate::time::MockClock;
