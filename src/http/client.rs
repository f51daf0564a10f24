//! Authenticated HTTP client
//!
//! Executes [`HttpRequest`]s with:
//! - Credentials applied by the [`Authenticator`]
//! - A single token refresh and retry when a refreshable strategy gets a 401
//! - Optional client-side pacing
//! - Non-2xx responses mapped through the provider's [`FormatSwitch`]
//!
//! Response bodies are read to the end on every path. Nothing else is
//! retried here; callers decide what to do with `RateLimited` or `Server`.

use super::interpreter::FormatSwitch;
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::request::HttpRequest;
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use crate::url_builder::UrlBuilder;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Default request timeout; `None` leaves requests unbounded
    pub timeout: Option<Duration>,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: None,
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("solidafy-connect/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Body of a response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON
    Json(JsonValue),
    /// Non-JSON payload (CSV results, text)
    Raw(Bytes),
    /// No content
    Empty,
}

/// A successful response
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl JsonResponse {
    /// The JSON body; fails if the response had none
    pub fn json(&self) -> Result<&JsonValue> {
        match &self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Raw(_) => Err(Error::unmarshal(format!(
                "expected a JSON body from HTTP {} response",
                self.status
            ))),
            ResponseBody::Empty => Err(Error::missing_values(format!(
                "HTTP {} response has no body",
                self.status
            ))),
        }
    }

    /// The JSON body, or `null` if there was none
    pub fn json_or_null(&self) -> JsonValue {
        match &self.body {
            ResponseBody::Json(value) => value.clone(),
            _ => JsonValue::Null,
        }
    }

    /// The body as bytes
    pub fn bytes(&self) -> Bytes {
        match &self.body {
            ResponseBody::Json(value) => Bytes::from(value.to_string()),
            ResponseBody::Raw(bytes) => bytes.clone(),
            ResponseBody::Empty => Bytes::new(),
        }
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Authenticated HTTP client shared by every operation of a connector
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<HttpClientConfig>,
    authenticator: Option<Arc<Authenticator>>,
    rate_limiter: Option<RateLimiter>,
    errors: Arc<FormatSwitch>,
}

impl HttpClient {
    /// Create a client with default configuration and no auth
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config: Arc::new(config),
            authenticator: None,
            rate_limiter,
            errors: Arc::new(FormatSwitch::new()),
        })
    }

    /// Create a client with authentication
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.set_authenticator(auth_config);
        Ok(client)
    }

    /// Set the authenticator
    pub fn set_authenticator(&mut self, auth_config: AuthConfig) {
        self.authenticator = Some(Arc::new(Authenticator::with_client(
            auth_config,
            self.client.clone(),
        )));
    }

    /// Set the provider error format switch
    #[must_use]
    pub fn with_error_format(mut self, errors: FormatSwitch) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// The provider error format switch
    pub fn error_format(&self) -> &FormatSwitch {
        &self.errors
    }

    /// Base URL configured for relative paths
    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Resolve a relative path or absolute URL into a builder
    pub fn url(&self, path: &str) -> Result<UrlBuilder> {
        if UrlBuilder::is_absolute(path) {
            return UrlBuilder::parse(path);
        }
        match &self.config.base_url {
            Some(base) => UrlBuilder::new(base, &[path]),
            None => Err(Error::config(format!(
                "relative path '{path}' used without a base URL"
            ))),
        }
    }

    /// GET a path or URL
    pub async fn get(&self, path: &str) -> Result<JsonResponse> {
        self.execute(&HttpRequest::get(self.url(path)?)).await
    }

    /// POST a JSON body
    pub async fn post(&self, path: &str, body: JsonValue) -> Result<JsonResponse> {
        self.execute(&HttpRequest::post(self.url(path)?, body)).await
    }

    /// PUT a JSON body
    pub async fn put(&self, path: &str, body: JsonValue) -> Result<JsonResponse> {
        self.execute(&HttpRequest::new(Method::PUT, self.url(path)?).with_body(body))
            .await
    }

    /// PATCH a JSON body
    pub async fn patch(&self, path: &str, body: JsonValue) -> Result<JsonResponse> {
        self.execute(&HttpRequest::new(Method::PATCH, self.url(path)?).with_body(body))
            .await
    }

    /// DELETE a path or URL
    pub async fn delete(&self, path: &str) -> Result<JsonResponse> {
        self.execute(&HttpRequest::new(Method::DELETE, self.url(path)?))
            .await
    }

    /// Execute a request
    pub async fn execute(&self, req: &HttpRequest) -> Result<JsonResponse> {
        let (response, token) = self.dispatch(req).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(auth) = self.authenticator.as_ref().filter(|a| a.is_refreshable()) {
                // Drain before retrying so the connection is released
                let _ = response.bytes().await;
                warn!(url = %req.url.path(), "Received 401, refreshing token and retrying once");
                auth.invalidate(token.as_deref()).await;
                let (retry, _) = self.dispatch(req).await?;
                return self.read_response(retry).await;
            }
        }

        self.read_response(response).await
    }

    /// Send a streaming body (bulk uploads)
    ///
    /// The body is not buffered, so a 401 cannot be retried here.
    pub async fn upload(
        &self,
        method: Method,
        url: &UrlBuilder,
        content_type: &str,
        body: reqwest::Body,
    ) -> Result<JsonResponse> {
        let req = self
            .prepare(method, url, &[], None)
            .await?
            .header(CONTENT_TYPE, content_type)
            .body(body);
        let response = req.send().await.map_err(|e| self.map_send_error(e, None))?;
        self.read_response(response).await
    }

    /// GET a resource and stream its body
    pub async fn download(
        &self,
        url: &UrlBuilder,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let (response, _) = self.dispatch(&HttpRequest::get(url.clone())).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().await?;
            return Err(self.errors.interpret(status, &body));
        }
        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    async fn prepare(
        &self,
        method: Method,
        url: &UrlBuilder,
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<reqwest::RequestBuilder> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self.client.request(method.into(), url.to_string());
        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(timeout) = timeout.or(self.config.timeout) {
            req = req.timeout(timeout);
        }
        if let Some(ref auth) = self.authenticator {
            req = auth.apply(req).await?;
        }
        Ok(req)
    }

    async fn dispatch(&self, req: &HttpRequest) -> Result<(reqwest::Response, Option<String>)> {
        let mut builder = self
            .prepare(req.method, &req.url, &req.headers, req.timeout)
            .await?;
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }
        let token = match &self.authenticator {
            Some(auth) if auth.is_refreshable() => auth.current_token().await,
            _ => None,
        };

        debug!(method = %req.method, url = %req.url, "Sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(e, req.timeout))?;
        Ok((response, token))
    }

    fn map_send_error(&self, e: reqwest::Error, timeout: Option<Duration>) -> Error {
        if e.is_timeout() {
            let timeout = timeout.or(self.config.timeout).unwrap_or_default();
            Error::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            Error::Network(e)
        }
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<JsonResponse> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        if !(200..300).contains(&status) {
            debug!(status, "Provider returned an error response");
            return Err(self.errors.interpret(status, &bytes));
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            ResponseBody::Empty
        } else {
            match serde_json::from_slice::<JsonValue>(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) if is_json_content(&headers) => {
                    return Err(Error::unmarshal(e.to_string()));
                }
                Err(_) => ResponseBody::Raw(bytes),
            }
        };

        Ok(JsonResponse {
            status,
            headers,
            body,
        })
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .field("error_templates", &self.errors.len())
            .finish_non_exhaustive()
    }
}
