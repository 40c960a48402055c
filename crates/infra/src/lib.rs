//! # tokenrelay infrastructure
//!
//! The impure edges of the client:
//! - configuration resolution (explicit values, environment, file, fallback)
//! - the reqwest transport
//! - the retrying request executor
//! - API description loading and the [`ApiClient`] facade
//!
//! ## Architecture
//! - Token lifecycle lives in `tokenrelay-common`
//! - Configuration types and the domain error live in `tokenrelay-domain`

pub mod api;
pub mod config;
pub mod http;

pub use api::{
    ApiClient, ApiClientBuilder, ApiError, ApiRequest, ApiResponse, ApiSpec, ExecError, ExecOutput,
    OperationRequest, RequestExecutor,
};
pub use http::{HttpTransport, Transport};
