//! Request execution and the API client facade
//!
//! - [`request`]: request/response descriptors
//! - [`errors`]: transport failures, their classification and terminal errors
//! - [`executor`]: credential injection plus bounded retry
//! - [`spec`]: operation catalog from an API description document
//! - [`client`]: facade wiring config, token lifecycle and executor

pub mod client;
pub mod errors;
pub mod executor;
pub mod request;
pub mod spec;

pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ExecError, Failure, FailureClass, SpecError, TransportError};
pub use executor::{authorize_headers, retry_wait, ExecOutput, RequestExecutor, RetryState};
pub use request::{ApiRequest, ApiResponse};
pub use spec::{ApiSpec, OperationRequest, OperationSpec, ParamLocation};
