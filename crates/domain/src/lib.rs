//! # TokenRelay Domain
//!
//! Plain data shared by every TokenRelay crate.
//!
//! This crate contains:
//! - The workspace error type and `Result` alias
//! - Configuration structures consumed by the token lifecycle and executor
//! - Defaults and other constants
//!
//! ## Architecture
//! - No dependencies on other TokenRelay crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
