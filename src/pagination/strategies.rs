//! Pagination strategy implementations
//!
//! Each strategy handles one pagination family. Provider cursors are passed
//! through untouched; page, offset and time-window state is packed into an
//! opaque token by [`PageState`].

use super::types::{NextPage, Page, PageState, PaginationFamily, Paginator};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, ParamLocation};
use crate::jsonquery::JsonQuery;
use crate::types::{JsonValue, TimeFormat};
use crate::url_builder::UrlBuilder;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

fn apply_page_size(
    req: &mut HttpRequest,
    param: Option<&ParamLocation>,
    page_size: usize,
) -> Result<()> {
    match param {
        Some(param) => req.set_param(param, JsonValue::from(page_size)),
        None => Ok(()),
    }
}

/// Stop when a response field holds a given value (e.g. `hasNextPage: false`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopWhen {
    pub path: String,
    pub value: JsonValue,
}

impl StopWhen {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    fn matches(&self, body: &JsonValue) -> bool {
        JsonQuery::new(body).value_optional(&self.path) == Some(&self.value)
    }
}

// ============================================================================
// Opaque Cursor Pagination
// ============================================================================

/// Cursor read from the response body and replayed verbatim
///
/// Covers `?cursor=abc`, `page[after]=..` and GraphQL `after` variables
/// with `pageInfo.endCursor`.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Where the cursor is sent
    pub cursor_param: ParamLocation,
    /// Path of the next cursor in the response
    pub cursor_path: String,
    /// Where the page size is sent
    pub page_size_param: Option<ParamLocation>,
    /// Extra stop condition checked before the cursor
    pub stop_when: Option<StopWhen>,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(cursor_param: ParamLocation, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param,
            cursor_path: cursor_path.into(),
            page_size_param: None,
            stop_when: None,
        }
    }

    /// Send the page size at this location
    #[must_use]
    pub fn page_size_param(mut self, param: ParamLocation) -> Self {
        self.page_size_param = Some(param);
        self
    }

    /// Stop when a field equals a value
    #[must_use]
    pub fn stop_when(mut self, stop: StopWhen) -> Self {
        self.stop_when = Some(stop);
        self
    }
}

impl Paginator for CursorPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::OpaqueCursor
    }

    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()> {
        apply_page_size(req, self.page_size_param.as_ref(), page_size)?;
        if let Some(cursor) = token {
            req.set_param(&self.cursor_param, JsonValue::String(cursor.to_string()))?;
        }
        Ok(())
    }

    fn next_page(&self, page: &Page<'_>) -> Result<NextPage> {
        if self.stop_when.as_ref().is_some_and(|s| s.matches(page.body)) {
            return Ok(NextPage::Done);
        }
        let query = JsonQuery::new(page.body);
        let cursor = match query.value_optional(&self.cursor_path) {
            None => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(Error::NotString {
                    key: self.cursor_path.clone(),
                })
            }
        };
        Ok(match cursor.filter(|c| !c.is_empty()) {
            Some(c) => NextPage::Continue(c),
            None => NextPage::Done,
        })
    }
}

// ============================================================================
// URL Cursor Pagination
// ============================================================================

fn default_next_url_path() -> String {
    "links.next".to_string()
}

/// Full next-page URL in the response body, replayed verbatim
#[derive(Debug, Clone)]
pub struct UrlCursorPaginator {
    /// Path of the next URL in the response
    pub next_url_path: String,
    /// Where the page size is sent on the first request
    pub page_size_param: Option<ParamLocation>,
    /// Rewrite the origin of replayed URLs (tests, proxies)
    pub origin: Option<String>,
}

impl UrlCursorPaginator {
    /// Create a new URL cursor paginator
    pub fn new(next_url_path: impl Into<String>) -> Self {
        Self {
            next_url_path: next_url_path.into(),
            page_size_param: None,
            origin: None,
        }
    }

    /// Send the page size at this location on the first request
    #[must_use]
    pub fn page_size_param(mut self, param: ParamLocation) -> Self {
        self.page_size_param = Some(param);
        self
    }

    /// Replay next URLs against another origin
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl Paginator for UrlCursorPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::UrlCursor
    }

    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()> {
        match token {
            Some(next) => {
                let mut url = UrlBuilder::parse(next)?;
                if let Some(origin) = &self.origin {
                    url.with_origin(origin)?;
                }
                req.url = url;
                Ok(())
            }
            None => apply_page_size(req, self.page_size_param.as_ref(), page_size),
        }
    }

    fn next_page(&self, page: &Page<'_>) -> Result<NextPage> {
        let next = JsonQuery::new(page.body).str_optional(&self.next_url_path)?;
        Ok(match next.filter(|n| !n.is_empty()) {
            Some(n) => NextPage::Continue(n.to_string()),
            None => NextPage::Done,
        })
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination; a short page ends iteration
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    pub page_param: ParamLocation,
    /// First page number (usually 0 or 1)
    pub start_page: u64,
    pub page_size_param: Option<ParamLocation>,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(page_param: ParamLocation, start_page: u64) -> Self {
        Self {
            page_param,
            start_page,
            page_size_param: None,
        }
    }

    /// Send the page size at this location
    #[must_use]
    pub fn page_size_param(mut self, param: ParamLocation) -> Self {
        self.page_size_param = Some(param);
        self
    }

    fn current(&self, token: Option<&str>) -> Result<u64> {
        match token.map(PageState::decode).transpose()? {
            None => Ok(self.start_page),
            Some(PageState::Page(n)) => Ok(n),
            Some(_) => Err(Error::InvalidPageToken {
                token: token.unwrap_or_default().to_string(),
            }),
        }
    }
}

impl Paginator for PageNumberPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::PageNumber
    }

    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()> {
        apply_page_size(req, self.page_size_param.as_ref(), page_size)?;
        req.set_param(&self.page_param, JsonValue::from(self.current(token)?))
    }

    fn next_page(&self, page: &Page<'_>) -> Result<NextPage> {
        if page.records.len() < page.page_size {
            return Ok(NextPage::Done);
        }
        let next = self.current(page.token)? + 1;
        Ok(NextPage::Continue(PageState::Page(next).encode()))
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset pagination; a short page ends iteration
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    pub offset_param: ParamLocation,
    /// Where the page size (limit) is sent
    pub limit_param: Option<ParamLocation>,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(offset_param: ParamLocation, limit_param: Option<ParamLocation>) -> Self {
        Self {
            offset_param,
            limit_param,
        }
    }

    fn current(token: Option<&str>) -> Result<u64> {
        match token.map(PageState::decode).transpose()? {
            None => Ok(0),
            Some(PageState::Offset(n)) => Ok(n),
            Some(_) => Err(Error::InvalidPageToken {
                token: token.unwrap_or_default().to_string(),
            }),
        }
    }
}

impl Paginator for OffsetPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::Offset
    }

    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()> {
        apply_page_size(req, self.limit_param.as_ref(), page_size)?;
        req.set_param(&self.offset_param, JsonValue::from(Self::current(token)?))
    }

    fn next_page(&self, page: &Page<'_>) -> Result<NextPage> {
        if page.records.len() < page.page_size {
            return Ok(NextPage::Done);
        }
        let next = Self::current(page.token)? + page.records.len() as u64;
        Ok(NextPage::Continue(PageState::Offset(next).encode()))
    }
}

// ============================================================================
// Time Window Pagination
// ============================================================================

/// Sliding `since` window driven by the newest updated-at value in a page
///
/// Replays set the `since` parameter to the high-water mark; an empty or
/// short page ends iteration.
#[derive(Debug, Clone)]
pub struct TimeWindowPaginator {
    pub since_param: ParamLocation,
    /// Field holding the record's updated-at timestamp
    pub updated_field: String,
    pub format: TimeFormat,
    pub page_size_param: Option<ParamLocation>,
}

impl TimeWindowPaginator {
    /// Create a new time window paginator
    pub fn new(since_param: ParamLocation, updated_field: impl Into<String>) -> Self {
        Self {
            since_param,
            updated_field: updated_field.into(),
            format: TimeFormat::default(),
            page_size_param: None,
        }
    }

    /// Wire format for the replayed `since`
    #[must_use]
    pub fn format(mut self, format: TimeFormat) -> Self {
        self.format = format;
        self
    }

    /// Send the page size at this location
    #[must_use]
    pub fn page_size_param(mut self, param: ParamLocation) -> Self {
        self.page_size_param = Some(param);
        self
    }

    /// The high-water mark carried by a token
    pub fn since_from_token(token: &str) -> Result<DateTime<Utc>> {
        let invalid = || Error::InvalidPageToken {
            token: token.to_string(),
        };
        match PageState::decode(token)? {
            PageState::Since(s) => DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// Parse a provider timestamp: RFC 3339 string or unix seconds/milliseconds
pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(from_epoch)),
        JsonValue::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    // Values past year 33658 in seconds are taken as milliseconds
    if n.abs() >= 1_000_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

impl Paginator for TimeWindowPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::TimeWindow
    }

    fn apply(&self, req: &mut HttpRequest, page_size: usize, token: Option<&str>) -> Result<()> {
        apply_page_size(req, self.page_size_param.as_ref(), page_size)?;
        if let Some(token) = token {
            let since = Self::since_from_token(token)?;
            req.set_param(&self.since_param, self.format.format(&since))?;
        }
        Ok(())
    }

    fn next_page(&self, page: &Page<'_>) -> Result<NextPage> {
        if page.records.len() < page.page_size {
            return Ok(NextPage::Done);
        }
        let high_water = page
            .records
            .iter()
            .filter_map(|r| JsonQuery::new(r).value_optional(&self.updated_field))
            .filter_map(parse_timestamp)
            .max()
            .ok_or_else(|| {
                Error::missing_values(format!(
                    "no '{}' timestamps in a full page",
                    self.updated_field
                ))
            })?;
        let since = high_water.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
        Ok(NextPage::Continue(PageState::Since(since).encode()))
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// Single page, no pagination
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn family(&self) -> PaginationFamily {
        PaginationFamily::None
    }

    fn apply(&self, _req: &mut HttpRequest, _page_size: usize, _token: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn next_page(&self, _page: &Page<'_>) -> Result<NextPage> {
        Ok(NextPage::Done)
    }
}

// ============================================================================
// Declarative Definition
// ============================================================================

fn default_start_page() -> u64 {
    1
}

/// Pagination as written in a provider definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    Cursor {
        cursor_param: ParamLocation,
        cursor_path: String,
        #[serde(default)]
        page_size_param: Option<ParamLocation>,
        #[serde(default)]
        stop_when: Option<StopWhen>,
    },
    UrlCursor {
        #[serde(default = "default_next_url_path")]
        next_url_path: String,
        #[serde(default)]
        page_size_param: Option<ParamLocation>,
    },
    PageNumber {
        page_param: ParamLocation,
        #[serde(default = "default_start_page")]
        start_page: u64,
        #[serde(default)]
        page_size_param: Option<ParamLocation>,
    },
    Offset {
        offset_param: ParamLocation,
        #[serde(default)]
        limit_param: Option<ParamLocation>,
    },
    TimeWindow {
        since_param: ParamLocation,
        updated_field: String,
        #[serde(default)]
        format: TimeFormat,
        #[serde(default)]
        page_size_param: Option<ParamLocation>,
    },
    #[default]
    None,
}

impl PaginationDefinition {
    /// Build the strategy for this definition
    pub fn build(&self) -> Box<dyn Paginator> {
        match self.clone() {
            Self::Cursor {
                cursor_param,
                cursor_path,
                page_size_param,
                stop_when,
            } => Box::new(CursorPaginator {
                cursor_param,
                cursor_path,
                page_size_param,
                stop_when,
            }),
            Self::UrlCursor {
                next_url_path,
                page_size_param,
            } => Box::new(UrlCursorPaginator {
                next_url_path,
                page_size_param,
                origin: None,
            }),
            Self::PageNumber {
                page_param,
                start_page,
                page_size_param,
            } => Box::new(PageNumberPaginator {
                page_param,
                start_page,
                page_size_param,
            }),
            Self::Offset {
                offset_param,
                limit_param,
            } => Box::new(OffsetPaginator::new(offset_param, limit_param)),
            Self::TimeWindow {
                since_param,
                updated_field,
                format,
                page_size_param,
            } => Box::new(TimeWindowPaginator {
                since_param,
                updated_field,
                format,
                page_size_param,
            }),
            Self::None => Box::new(NoPaginator),
        }
    }

    /// Family of this definition
    pub fn family(&self) -> PaginationFamily {
        match self {
            Self::Cursor { .. } => PaginationFamily::OpaqueCursor,
            Self::UrlCursor { .. } => PaginationFamily::UrlCursor,
            Self::PageNumber { .. } => PaginationFamily::PageNumber,
            Self::Offset { .. } => PaginationFamily::Offset,
            Self::TimeWindow { .. } => PaginationFamily::TimeWindow,
            Self::None => PaginationFamily::None,
        }
    }
}
