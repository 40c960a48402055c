//! HTTP transport
//!
//! The executor talks to the network through the [`Transport`] trait;
//! [`HttpTransport`] is the reqwest implementation.

pub mod client;

pub use client::{HttpTransport, HttpTransportBuilder, Transport};
