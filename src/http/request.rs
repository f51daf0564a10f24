//! Provider-neutral request description
//!
//! Handlers build an [`HttpRequest`]; the client executes it. Pagination and
//! incremental filters write into a request through a [`ParamLocation`], which
//! abstracts over query parameters, GraphQL variables and JSON body fields.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use crate::url_builder::UrlBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Where a request parameter is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "in", content = "name", rename_all = "snake_case")]
pub enum ParamLocation {
    /// URL query parameter
    Query(String),
    /// Dotted path under the GraphQL `variables` object
    Variable(String),
    /// Dotted path in the JSON body
    Body(String),
}

impl ParamLocation {
    /// Query parameter shorthand
    pub fn query(name: impl Into<String>) -> Self {
        Self::Query(name.into())
    }

    /// GraphQL variable shorthand
    pub fn variable(path: impl Into<String>) -> Self {
        Self::Variable(path.into())
    }

    /// Body field shorthand
    pub fn body(path: impl Into<String>) -> Self {
        Self::Body(path.into())
    }
}

/// A request ready to be executed by the HTTP client
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: UrlBuilder,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    /// Per-request timeout; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request
    pub fn new(method: Method, url: UrlBuilder) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// GET request
    pub fn get(url: UrlBuilder) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST request with a JSON body
    pub fn post(url: UrlBuilder, body: JsonValue) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    /// GraphQL request: `{"query": .., "variables": ..}`
    pub fn graphql(url: UrlBuilder, query: &str, variables: JsonValue) -> Self {
        Self::post(url, json!({ "query": query, "variables": variables }))
    }

    /// Set the JSON body
    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set a timeout for this request
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Write a value at a parameter location
    pub fn set_param(&mut self, location: &ParamLocation, value: JsonValue) -> Result<()> {
        match location {
            ParamLocation::Query(name) => {
                self.url
                    .with_query_param(name.as_str(), crate::types::value_to_string(&value));
                Ok(())
            }
            ParamLocation::Variable(path) => {
                let body = self.body.get_or_insert_with(|| json!({}));
                set_path(body, &format!("variables.{path}"), value)
            }
            ParamLocation::Body(path) => {
                let body = self.body.get_or_insert_with(|| json!({}));
                set_path(body, path, value)
            }
        }
    }

    /// Read back a value written at a parameter location
    pub fn param(&self, location: &ParamLocation) -> Option<JsonValue> {
        match location {
            ParamLocation::Query(name) => self
                .url
                .query_param(name)
                .map(|v| JsonValue::String(v.to_string())),
            ParamLocation::Variable(path) => self
                .body
                .as_ref()
                .and_then(|b| get_path(b, &format!("variables.{path}")))
                .cloned(),
            ParamLocation::Body(path) => {
                self.body.as_ref().and_then(|b| get_path(b, path)).cloned()
            }
        }
    }
}

fn get_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Set a dotted path in a JSON object, creating intermediate objects
pub fn set_path(target: &mut JsonValue, path: &str, value: JsonValue) -> Result<()> {
    let mut parts = path.split('.').peekable();
    let mut current = target;
    while let Some(key) = parts.next() {
        let map = current.as_object_mut().ok_or_else(|| Error::NotObject {
            key: path.to_string(),
        })?;
        if parts.peek().is_none() {
            map.insert(key.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(key.to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
    }
    Ok(())
}
