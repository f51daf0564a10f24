//! Common types used throughout Solidafy Connect
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// What a connector can do for a given object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Delete,
    Subscribe,
    Metadata,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
            Capability::Subscribe => "subscribe",
            Capability::Metadata => "metadata",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Module Identifier
// ============================================================================

/// Symbolic name of a provider sub-API (e.g. "root", "crm")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Name of the module used when a provider has a single API surface
    pub const ROOT: &'static str = "root";

    /// Create a module id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The default module
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Normalize a caller-supplied object name
pub fn normalize_object_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// Alias Table
// ============================================================================

/// Mapping from object names to provider keys, falling back to the input
///
/// Providers commonly need plural↔singular, camel↔snake or schema-casing
/// remaps; each is one table rather than code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map.insert(key.into(), value.into());
        self
    }

    /// Look up a key, falling back to the key itself
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.map.get(key).map_or(key, String::as_str)
    }

    /// Reverse lookup: provider key back to object name
    pub fn reverse<'a>(&'a self, value: &'a str) -> &'a str {
        self.map
            .iter()
            .find(|(_, v)| v.as_str() == value)
            .map_or(value, |(k, _)| k.as_str())
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// Time Format
// ============================================================================

/// Wire format for timestamps sent to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// RFC 3339 in UTC with second precision (`2024-11-01T00:00:00Z`)
    #[default]
    Rfc3339,
    /// RFC 3339 in UTC with millisecond precision
    Rfc3339Millis,
    /// Unix timestamp (seconds)
    Unix,
    /// Unix timestamp (milliseconds)
    UnixMs,
    /// Calendar date (`2024-11-01`)
    Date,
}

impl TimeFormat {
    /// Format an instant for the wire
    pub fn format(&self, instant: &chrono::DateTime<chrono::Utc>) -> JsonValue {
        use chrono::SecondsFormat;
        match self {
            TimeFormat::Rfc3339 => {
                JsonValue::String(instant.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            TimeFormat::Rfc3339Millis => {
                JsonValue::String(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            TimeFormat::Unix => JsonValue::from(instant.timestamp()),
            TimeFormat::UnixMs => JsonValue::from(instant.timestamp_millis()),
            TimeFormat::Date => JsonValue::String(instant.format("%Y-%m-%d").to_string()),
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Render a scalar JSON value as a plain string (strings unquoted)
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
