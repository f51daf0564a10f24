//! HTTP transport
//!
//! # Features
//!
//! - **Authentication**: every request passes through the auth module, with
//!   one refresh-and-retry on 401 for token-based strategies
//! - **Error interpretation**: non-2xx bodies are matched against the
//!   provider's format switch before the error reaches the caller
//! - **Rate Limiting**: optional token bucket pacing using governor
//! - **Streaming**: bulk uploads and result downloads are not buffered

mod client;
mod interpreter;
mod rate_limit;
mod request;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, JsonResponse, ResponseBody};
pub use interpreter::{
    CombineError, ErrorTemplateDefinition, FormatSwitch, FormatTemplate, MessageList,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::{set_path, HttpRequest, ParamLocation};
