//! Error types for Solidafy Connect
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every variant maps onto one stable [`ErrorKind`]. Callers branch on the
//! kind (`err.is(ErrorKind::NotFound)`) and show the `Display` text, which
//! carries the HTTP status and any provider-supplied messages.

use crate::types::Capability;
use thiserror::Error;

// ============================================================================
// Error Kinds
// ============================================================================

/// Stable classification of every error the crate produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Provider responses
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    Server,
    Network,
    FailedToUnmarshalBody,
    MissingExpectedValues,

    // Pipeline validation
    OperationNotSupportedForObject,
    MissingObjects,
    MissingFields,
    MissingRecordData,
    MissingRecordId,
    ObjectNotFound,
    PaginationLoop,

    // JSON query
    KeyNotFound,
    NotArray,
    NotObject,
    NotNumeric,
    NotString,
    NotBool,

    // Setup
    Config,
    Auth,
    Bootstrap,
    BulkJob,
    Other,
}

impl ErrorKind {
    /// Coarse kind derived from an HTTP status code
    ///
    /// Returns `None` for non-error statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            429 => Some(Self::RateLimited),
            402 | 405..=408 | 410..=428 | 430..=499 => Some(Self::BadRequest),
            500..=599 => Some(Self::Server),
            _ => None,
        }
    }

    /// Stable human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate limited",
            Self::Server => "server error",
            Self::Network => "network error",
            Self::FailedToUnmarshalBody => "failed to unmarshal body",
            Self::MissingExpectedValues => "missing expected values",
            Self::OperationNotSupportedForObject => "operation not supported for object",
            Self::MissingObjects => "missing objects",
            Self::MissingFields => "missing fields",
            Self::MissingRecordData => "missing record data",
            Self::MissingRecordId => "missing record id",
            Self::ObjectNotFound => "object not found",
            Self::PaginationLoop => "pagination loop",
            Self::KeyNotFound => "key not found",
            Self::NotArray => "not an array",
            Self::NotObject => "not an object",
            Self::NotNumeric => "not numeric",
            Self::NotString => "not a string",
            Self::NotBool => "not a boolean",
            Self::Config => "configuration error",
            Self::Auth => "authentication error",
            Self::Bootstrap => "post-auth bootstrap failed",
            Self::BulkJob => "bulk job error",
            Self::Other => "error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error
// ============================================================================

/// The main error type for Solidafy Connect
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Provider Response Errors
    // ============================================================================
    #[error("{kind} (HTTP {status}){}", details_suffix(.details))]
    Api {
        kind: ErrorKind,
        status: u16,
        details: Vec<String>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("network error: request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("failed to unmarshal body: {message}")]
    FailedToUnmarshalBody { message: String },

    #[error("missing expected values: {message}")]
    MissingExpectedValues { message: String },

    // ============================================================================
    // Pipeline Validation Errors
    // ============================================================================
    #[error("operation {capability} not supported for object '{object}'")]
    OperationNotSupportedForObject {
        object: String,
        capability: Capability,
    },

    #[error("missing objects: object name is required")]
    MissingObjects,

    #[error("missing fields: no fields requested for object '{object}'")]
    MissingFields { object: String },

    #[error("missing record data for object '{object}'")]
    MissingRecordData { object: String },

    #[error("missing record id for object '{object}'")]
    MissingRecordId { object: String },

    #[error("object not found: '{object}'")]
    ObjectNotFound { object: String },

    #[error("pagination loop: provider returned the input cursor '{cursor}' again")]
    PaginationLoop { cursor: String },

    #[error("bad request: page size {requested} exceeds provider maximum {max}")]
    PageSizeExceeded { requested: usize, max: usize },

    #[error("bad request: next page token '{token}' was not issued by this connector")]
    InvalidPageToken { token: String },

    #[error("bad request: '{segment}' cannot be used as a path segment")]
    InvalidPathSegment { segment: String },

    // ============================================================================
    // JSON Query Errors
    // ============================================================================
    #[error("key not found: '{key}'")]
    KeyNotFound { key: String },

    #[error("value at '{key}' is not an array")]
    NotArray { key: String },

    #[error("value at '{key}' is not an object")]
    NotObject { key: String },

    #[error("value at '{key}' is not numeric")]
    NotNumeric { key: String },

    #[error("value at '{key}' is not a string")]
    NotString { key: String },

    #[error("value at '{key}' is not a boolean")]
    NotBool { key: String },

    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid endpoint pattern '{pattern}': {message}")]
    InvalidEndpointPattern { pattern: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    #[error("JWT generation failed: {message}")]
    JwtGeneration { message: String },

    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    #[error("post-auth bootstrap failed: {message}")]
    Bootstrap { message: String },

    // ============================================================================
    // Bulk Errors
    // ============================================================================
    #[error("bulk job {job_id}: {message}")]
    BulkJob { job_id: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn details_suffix(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(": {}", details.join(", "))
    }
}

impl Error {
    /// Create a provider error from an HTTP status, without details
    pub fn from_status(status: u16) -> Self {
        Self::Api {
            kind: ErrorKind::from_status(status).unwrap_or(ErrorKind::Other),
            status,
            details: Vec::new(),
        }
    }

    /// Create a provider error of an explicit kind
    pub fn api(kind: ErrorKind, status: u16, details: Vec<String>) -> Self {
        Self::Api {
            kind,
            status,
            details,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a body decoding error
    pub fn unmarshal(message: impl Into<String>) -> Self {
        Self::FailedToUnmarshalBody {
            message: message.into(),
        }
    }

    /// Create a missing expected values error
    pub fn missing_values(message: impl Into<String>) -> Self {
        Self::MissingExpectedValues {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn not_supported(object: impl Into<String>, capability: Capability) -> Self {
        Self::OperationNotSupportedForObject {
            object: object.into(),
            capability,
        }
    }

    /// Create a bulk job error
    pub fn bulk(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BulkJob {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Append provider-supplied messages to a provider error
    ///
    /// Non-provider errors are returned unchanged.
    #[must_use]
    pub fn with_details<I, S>(self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Self::Api {
                kind,
                status,
                mut details,
            } => {
                details.extend(
                    messages
                        .into_iter()
                        .map(Into::into)
                        .filter(|m: &String| !m.is_empty()),
                );
                Self::Api {
                    kind,
                    status,
                    details,
                }
            }
            other => other,
        }
    }

    /// The stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { kind, .. } => *kind,
            Self::Network(_) | Self::Timeout { .. } => ErrorKind::Network,
            Self::FailedToUnmarshalBody { .. } | Self::JsonParse(_) => {
                ErrorKind::FailedToUnmarshalBody
            }
            Self::MissingExpectedValues { .. } => ErrorKind::MissingExpectedValues,
            Self::OperationNotSupportedForObject { .. } => {
                ErrorKind::OperationNotSupportedForObject
            }
            Self::MissingObjects => ErrorKind::MissingObjects,
            Self::MissingFields { .. } => ErrorKind::MissingFields,
            Self::MissingRecordData { .. } => ErrorKind::MissingRecordData,
            Self::MissingRecordId { .. } => ErrorKind::MissingRecordId,
            Self::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            Self::PaginationLoop { .. } => ErrorKind::PaginationLoop,
            Self::PageSizeExceeded { .. }
            | Self::InvalidPageToken { .. }
            | Self::InvalidPathSegment { .. } => ErrorKind::BadRequest,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::NotArray { .. } => ErrorKind::NotArray,
            Self::NotObject { .. } => ErrorKind::NotObject,
            Self::NotNumeric { .. } => ErrorKind::NotNumeric,
            Self::NotString { .. } => ErrorKind::NotString,
            Self::NotBool { .. } => ErrorKind::NotBool,
            Self::Config { .. }
            | Self::MissingConfigField { .. }
            | Self::InvalidEndpointPattern { .. }
            | Self::YamlParse(_)
            | Self::InvalidUrl(_)
            | Self::JsonPath { .. }
            | Self::Template { .. }
            | Self::UndefinedVariable { .. } => ErrorKind::Config,
            Self::Auth { .. }
            | Self::TokenRefresh { .. }
            | Self::JwtGeneration { .. }
            | Self::OAuth2 { .. } => ErrorKind::Auth,
            Self::Bootstrap { .. } => ErrorKind::Bootstrap,
            Self::BulkJob { .. } => ErrorKind::BulkJob,
            Self::Io(_) | Self::Other(_) | Self::Anyhow(_) => ErrorKind::Other,
        }
    }

    /// Check whether this error is of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// HTTP status of a provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Provider-supplied messages attached to this error
    pub fn details(&self) -> &[String] {
        match self {
            Self::Api { details, .. } => details,
            _ => &[],
        }
    }

    /// Check if a caller could reasonably retry this error
    ///
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::Server | ErrorKind::Network
        )
    }
}

/// Result type alias for Solidafy Connect
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(400, ErrorKind::BadRequest)]
    #[test_case(401, ErrorKind::Unauthorized)]
    #[test_case(403, ErrorKind::Forbidden)]
    #[test_case(404, ErrorKind::NotFound)]
    #[test_case(409, ErrorKind::Conflict)]
    #[test_case(422, ErrorKind::BadRequest)]
    #[test_case(429, ErrorKind::RateLimited)]
    #[test_case(500, ErrorKind::Server)]
    #[test_case(503, ErrorKind::Server)]
    fn test_kind_from_status(status: u16, expected: ErrorKind) {
        assert_eq!(Error::from_status(status).kind(), expected);
    }

    #[test]
    fn test_success_status_has_no_kind() {
        assert_eq!(ErrorKind::from_status(200), None);
        assert_eq!(ErrorKind::from_status(302), None);
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::from_status(400);
        assert_eq!(err.to_string(), "bad request (HTTP 400)");

        let err = err.with_details(["Failed to verify cursor", "", "second"]);
        assert_eq!(
            err.to_string(),
            "bad request (HTTP 400): Failed to verify cursor, second"
        );
        assert!(err.is(ErrorKind::BadRequest));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.details().len(), 2);
    }

    #[test]
    fn test_with_details_leaves_other_errors_alone() {
        let err = Error::MissingObjects.with_details(["ignored"]);
        assert!(err.is(ErrorKind::MissingObjects));
        assert!(err.details().is_empty());
    }

    #[test]
    fn test_page_size_is_bad_request() {
        let err = Error::PageSizeExceeded {
            requested: 500,
            max: 100,
        };
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::from_status(429).is_retryable());
        assert!(Error::from_status(502).is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());

        assert!(!Error::from_status(400).is_retryable());
        assert!(!Error::from_status(404).is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
