//! Credential provisioning and per-product access token caching.

pub mod provisioner;
pub mod token_cache;

pub use provisioner::AuthProvisioner;
pub use token_cache::TokenCache;
