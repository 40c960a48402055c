//! Token lifecycle for refresh-token authenticated APIs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ AccessTokenProvider  │  hands out a Credential per request
//! └──────────┬───────────┘
//!            │ empty or expired
//!            ▼
//! ┌──────────────────────┐      ┌─────────────┐
//! │   TokenAuthority     │─────►│ OAuthClient │  grant_type=refresh_token
//! │   (single-flight)    │      └─────────────┘
//! └──────────┬───────────┘
//!            │ renew
//!            ▼
//! ┌──────────────────────┐
//! │     TokenStore       │  Strict / Null / Memory / PlainFile
//! └──────────────────────┘
//! ```
//!
//! The provider and the authority share one store instance. The provider
//! only reads; the authority is the only writer.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokenrelay_common::auth::{
//!     AccessTokenProvider, PlainFileTokenStore, TokenAuthority, TokenStore,
//! };
//! use tokenrelay_domain::OAuthSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut settings = OAuthSettings::new(
//!         "client_id".to_string(),
//!         "client_secret".to_string(),
//!         "https://secure.example.com".to_string(),
//!     );
//!     settings.refresh_token = Some("refresh_token".to_string());
//!
//!     let store: Arc<dyn TokenStore> = Arc::new(PlainFileTokenStore::new("token.json"));
//!     let authority = Arc::new(TokenAuthority::from_settings(&settings, store.clone())?);
//!     let provider = AccessTokenProvider::new(store, authority);
//!
//!     let credential = provider.access_token().await?;
//!     let _header = credential.authorization_value();
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod client;
pub mod error;
pub mod file_store;
pub mod provider;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use authority::TokenAuthority;
pub use client::{OAuthClient, OAuthClientError};
pub use error::{AuthError, TokenStoreError};
pub use file_store::PlainFileTokenStore;
pub use provider::AccessTokenProvider;
pub use store::{MemoryTokenStore, NullTokenStore, StrictTokenStore};
pub use traits::{CredentialSource, OAuthClientTrait, TokenRefresher, TokenStore};
pub use types::{
    parse_expires_in, Credential, OAuthError, TokenField, TokenFields, TokenRecord, TokenResponse,
};
