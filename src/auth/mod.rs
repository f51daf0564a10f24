//! Authentication module
//!
//! Supports: API Key (header or query), Basic, Bearer, OAuth2 client
//! credentials, OAuth2 refresh token, JWT assertion, Custom Headers
//!
//! The `Authenticator` caches tokens for refreshable strategies. The HTTP
//! client invalidates the cache and retries once when a provider answers 401.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken, JwtAlgorithm, Location};
