//! Authenticator implementation
//!
//! Applies credentials to outgoing requests and owns the token cache for
//! refreshable strategies. Readers take a shared lock; a refresh takes the
//! write lock and re-checks before fetching so concurrent callers issue a
//! single token request.

use super::types::{AuthConfig, CachedToken, Location};
use crate::error::{Error, Result};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct TokenState {
    cached: Option<CachedToken>,
    /// Latest refresh token; providers may rotate it on every grant
    refresh_token: Option<String>,
}

/// Applies an [`AuthConfig`] to HTTP requests
pub struct Authenticator {
    config: AuthConfig,
    state: Arc<RwLock<TokenState>>,
    http_client: Client,
}

impl Authenticator {
    /// Create an authenticator with its own HTTP client for token requests
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator sharing an HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        let mut state = TokenState::default();
        if let AuthConfig::Oauth2Refresh {
            refresh_token,
            access_token,
            expires_at,
            ..
        } = &config
        {
            state.refresh_token = Some(refresh_token.clone());
            state.cached = access_token
                .clone()
                .filter(|t| !t.is_empty())
                .map(|t| CachedToken::new(t, *expires_at));
        }

        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            http_client,
        }
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),

            AuthConfig::ApiKey {
                location,
                name,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => {
                        let header = name.as_deref().unwrap_or("Authorization");
                        Ok(req.header(header, val))
                    }
                    Location::Query => {
                        let param = name.as_deref().unwrap_or("api_key");
                        Ok(req.query(&[(param, val)]))
                    }
                }
            }

            AuthConfig::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }

            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),

            AuthConfig::Oauth2ClientCredentials { .. }
            | AuthConfig::Oauth2Refresh { .. }
            | AuthConfig::Jwt { .. } => {
                let token = self.get_or_refresh_token().await?;
                Ok(req.bearer_auth(token))
            }

            AuthConfig::CustomHeaders { headers } => {
                let mut req = req;
                for (key, value) in headers {
                    req = req.header(key.as_str(), value.as_str());
                }
                Ok(req)
            }
        }
    }

    /// Whether a 401 can be answered by re-acquiring a token
    pub fn is_refreshable(&self) -> bool {
        self.config.is_refreshable()
    }

    /// Drop the cached access token if it is still `rejected`
    ///
    /// Another task may already have replaced it; in that case the newer
    /// token is kept.
    pub async fn invalidate(&self, rejected: Option<&str>) {
        let mut state = self.state.write().await;
        let stale = match (&state.cached, rejected) {
            (Some(cached), Some(rejected)) => cached.token == rejected,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if stale {
            debug!(auth = self.config.kind(), "Invalidating cached access token");
            state.cached = None;
        }
    }

    /// Currently cached access token, if any
    pub async fn current_token(&self) -> Option<String> {
        self.state.read().await.cached.as_ref().map(|t| t.token.clone())
    }

    /// Get a valid token, refreshing if necessary
    async fn get_or_refresh_token(&self) -> Result<String> {
        {
            let state = self.state.read().await;
            if let Some(token) = state.cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut state = self.state.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = state.cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let (new_token, rotated) = self.fetch_new_token(state.refresh_token.as_deref()).await?;
        let token_str = new_token.token.clone();
        state.cached = Some(new_token);
        if let Some(rotated) = rotated {
            debug!("Refresh token rotated by provider");
            state.refresh_token = Some(rotated);
        }

        Ok(token_str)
    }

    async fn fetch_new_token(
        &self,
        current_refresh: Option<&str>,
    ) -> Result<(CachedToken, Option<String>)> {
        match &self.config {
            AuthConfig::Oauth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
                token_body,
            } => {
                let mut form = vec![
                    ("grant_type", "client_credentials".to_string()),
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.clone()),
                ];
                if !scopes.is_empty() {
                    form.push(("scope", scopes.join(" ")));
                }
                for (key, value) in token_body {
                    form.push((key.as_str(), value.clone()));
                }
                let response = self.token_request(token_url, &form).await?;
                Ok((response.cached_token(), None))
            }

            AuthConfig::Oauth2Refresh {
                token_url,
                client_id,
                client_secret,
                refresh_token,
                ..
            } => {
                let refresh = current_refresh.unwrap_or(refresh_token);
                let form = vec![
                    ("grant_type", "refresh_token".to_string()),
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.clone()),
                    ("refresh_token", refresh.to_string()),
                ];
                let response = self.token_request(token_url, &form).await.map_err(|e| {
                    Error::TokenRefresh {
                        message: e.to_string(),
                    }
                })?;
                let rotated = response
                    .refresh_token
                    .clone()
                    .filter(|r| !r.is_empty() && r != refresh);
                Ok((response.cached_token(), rotated))
            }

            AuthConfig::Jwt { .. } => Ok((self.generate_jwt().await?, None)),

            _ => Err(Error::auth("token refresh not supported for this auth type")),
        }
    }

    async fn token_request(
        &self,
        token_url: &str,
        form: &[(&str, String)],
    ) -> Result<TokenResponse> {
        let response = self.http_client.post(token_url).form(form).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth2 {
                message: format!("token request failed with status {status}: {body}"),
            });
        }

        Ok(response.json().await?)
    }

    /// Sign a JWT and optionally exchange it for an access token
    async fn generate_jwt(&self) -> Result<CachedToken> {
        let AuthConfig::Jwt {
            issuer,
            subject,
            audience,
            private_key,
            algorithm,
            token_lifetime_seconds,
            claims,
            token_url,
        } = &self.config
        else {
            return Err(Error::auth("not a JWT auth config"));
        };

        let now = Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)]
        let lifetime = *token_lifetime_seconds as i64;

        let jwt_claims = JwtClaims {
            iss: issuer.clone(),
            sub: subject.clone(),
            aud: audience.clone(),
            iat: now,
            exp: now + lifetime,
            extra: claims.clone(),
        };

        let key = match algorithm {
            super::JwtAlgorithm::HS256 => Ok(EncodingKey::from_secret(private_key.as_bytes())),
            super::JwtAlgorithm::ES256 => EncodingKey::from_ec_pem(private_key.as_bytes()),
            _ => EncodingKey::from_rsa_pem(private_key.as_bytes()),
        }
        .map_err(|e| Error::JwtGeneration {
            message: format!("invalid private key: {e}"),
        })?;

        let jwt = encode(&Header::new((*algorithm).into()), &jwt_claims, &key).map_err(|e| {
            Error::JwtGeneration {
                message: format!("failed to encode JWT: {e}"),
            }
        })?;

        match token_url {
            Some(url) => {
                let form = vec![
                    (
                        "grant_type",
                        "urn:ietf:params:oauth:grant-type:jwt-bearer".to_string(),
                    ),
                    ("assertion", jwt),
                ];
                let response = self.token_request(url, &form).await.map_err(|e| {
                    Error::JwtGeneration {
                        message: e.to_string(),
                    }
                })?;
                Ok(response.cached_token())
            }
            None => Ok(CachedToken::expires_in(jwt, lifetime)),
        }
    }

    /// Get the auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("kind", &self.config.kind())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn cached_token(&self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token.clone(), secs),
            None => CachedToken::new(self.access_token.clone(), None),
        }
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    aud: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    extra: HashMap<String, String>,
}
