//! Auth configuration types
//!
//! Credentials are supplied by the caller; a provider definition only names
//! the style it expects. `AuthConfig` deserializes from a tagged document so
//! harnesses can load it from YAML or JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an API key is placed on the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    #[default]
    Header,
    Query,
}

/// JWT signing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    HS256,
    #[default]
    RS256,
    RS384,
    RS512,
    ES256,
}

impl From<JwtAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
        }
    }
}

fn default_jwt_lifetime() -> u64 {
    3600
}

/// Authentication strategy, fixed when the client is built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,

    /// Static API key in a header or query parameter
    ApiKey {
        #[serde(default)]
        location: Location,
        /// Header or query parameter name
        #[serde(default)]
        name: Option<String>,
        /// Prefix added before the value (e.g. "Token ")
        #[serde(default)]
        prefix: Option<String>,
        value: String,
    },

    /// HTTP Basic
    Basic { username: String, password: String },

    /// Static bearer token
    Bearer { token: String },

    /// OAuth2 client credentials grant
    Oauth2ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        #[serde(default)]
        scopes: Vec<String>,
        #[serde(default)]
        token_body: HashMap<String, String>,
    },

    /// OAuth2 with a refresh token
    ///
    /// A seeded `access_token` is used until it expires or the provider
    /// answers 401, after which the refresh grant runs.
    Oauth2Refresh {
        token_url: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default)]
        access_token: Option<String>,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Signed JWT assertion, optionally exchanged for an access token
    Jwt {
        issuer: String,
        #[serde(default)]
        subject: Option<String>,
        audience: String,
        /// PEM key (RSA/EC) or shared secret (HS256)
        private_key: String,
        #[serde(default)]
        algorithm: JwtAlgorithm,
        #[serde(default = "default_jwt_lifetime")]
        token_lifetime_seconds: u64,
        #[serde(default)]
        claims: HashMap<String, String>,
        #[serde(default)]
        token_url: Option<String>,
    },

    /// Arbitrary static headers
    CustomHeaders { headers: HashMap<String, String> },
}

impl AuthConfig {
    /// Whether the strategy holds a token that can be re-acquired
    pub fn is_refreshable(&self) -> bool {
        matches!(
            self,
            AuthConfig::Oauth2ClientCredentials { .. }
                | AuthConfig::Oauth2Refresh { .. }
                | AuthConfig::Jwt { .. }
        )
    }

    /// Short name of the strategy, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::Oauth2ClientCredentials { .. } => "oauth2_client_credentials",
            AuthConfig::Oauth2Refresh { .. } => "oauth2_refresh",
            AuthConfig::Jwt { .. } => "jwt",
            AuthConfig::CustomHeaders { .. } => "custom_headers",
        }
    }
}

/// Cached access token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        Self {
            token,
            expires_at: Some(Utc::now() + chrono::Duration::seconds(seconds)),
        }
    }

    /// Check if the token is expired (with a 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(30) >= expires_at,
            None => false,
        }
    }
}
