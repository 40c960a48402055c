//! Time utilities
//!
//! - **[`clock`]**: injectable wall clock ([`Clock`], [`SystemClock`],
//!   [`MockClock`])

pub mod clock;

pub use clock::{system_clock, Clock, MockClock, SharedClock, SystemClock};
