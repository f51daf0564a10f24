//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::{Error, Result};
use crate::http::HttpRequest;
use crate::types::JsonValue;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The pagination families observed across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationFamily {
    /// Opaque cursor read from the response body
    OpaqueCursor,
    /// Full next-page URL read from the response body
    UrlCursor,
    /// Page number incremented per call
    PageNumber,
    /// Offset advanced by the returned count
    Offset,
    /// High-water mark of an updated-at field replayed as `since`
    TimeWindow,
    /// Single page
    None,
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available; replay this token
    Continue(String),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The token to hand to the caller, `""` when done
    pub fn into_token(self) -> String {
        match self {
            Self::Continue(token) => token,
            Self::Done => String::new(),
        }
    }
}

/// One fetched page, as seen by a paginator
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    /// Whole response body
    pub body: &'a JsonValue,
    /// Records extracted from the body
    pub records: &'a [JsonValue],
    /// Page size the request asked for
    pub page_size: usize,
    /// Token the request was built from, if any
    pub token: Option<&'a str>,
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Family implemented by this strategy
    fn family(&self) -> PaginationFamily;

    /// Apply page size and, when replaying, the token to a request
    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()>;

    /// Compute the next page from a fetched page
    fn next_page(&self, page: &Page<'_>) -> Result<NextPage>;
}

/// Advance pagination with the guarantees every family shares
///
/// An empty page always terminates, and a token equal to the one the
/// request was built from is a fault rather than a next page.
pub fn advance(paginator: &dyn Paginator, page: &Page<'_>) -> Result<NextPage> {
    if page.records.is_empty() {
        return Ok(NextPage::Done);
    }
    let next = paginator.next_page(page)?;
    if let (NextPage::Continue(next), Some(current)) = (&next, page.token) {
        if next == current {
            return Err(Error::PaginationLoop {
                cursor: current.to_string(),
            });
        }
    }
    Ok(next)
}

// ============================================================================
// Page Size Policy
// ============================================================================

/// Default page size when neither caller nor provider specify one
pub const DEFAULT_PAGE_SIZE: usize = 50;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Provider page-size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSizePolicy {
    #[serde(default = "default_page_size")]
    pub default: usize,
    #[serde(default)]
    pub max: Option<usize>,
}

impl Default for PageSizePolicy {
    fn default() -> Self {
        Self {
            default: DEFAULT_PAGE_SIZE,
            max: None,
        }
    }
}

impl PageSizePolicy {
    /// Policy with a provider maximum
    pub fn with_max(default: usize, max: usize) -> Self {
        Self {
            default: default.min(max),
            max: Some(max),
        }
    }

    /// Page size for a request; larger than the maximum is rejected
    pub fn resolve(&self, requested: Option<usize>) -> Result<usize> {
        match requested.filter(|&n| n > 0) {
            None => Ok(self.default),
            Some(n) => match self.max {
                Some(max) if n > max => Err(Error::PageSizeExceeded { requested: n, max }),
                _ => Ok(n),
            },
        }
    }
}

// ============================================================================
// Internal Page State
// ============================================================================

/// State packed into tokens for families that have no provider cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Page(u64),
    Offset(u64),
    Since(String),
}

impl PageState {
    /// Encode as an opaque token
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token produced by [`encode`](Self::encode)
    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || Error::InvalidPageToken {
            token: token.to_string(),
        };
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}
