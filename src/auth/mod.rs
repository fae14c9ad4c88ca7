//! Credential caching: per-user tokens and the shared service grant.

pub mod claims;
pub mod service;
pub mod token_store;

pub use service::{IdentityProvider, ServiceCredential, ServiceTokenCache};
pub use token_store::{StoredCredential, TokenStore};
