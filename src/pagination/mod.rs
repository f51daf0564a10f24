//! Pagination module
//!
//! Supports: Opaque Cursor, URL Cursor, Page Number, Offset, Time Window
//!
//! # Overview
//!
//! A paginator writes page size and the replayed token into a request, then
//! reads the next token from the fetched page. Callers only ever see one
//! opaque string per page and replay it verbatim; `""` means done.
//!
//! [`advance`] wraps every strategy with the shared guarantees: an empty page
//! terminates and a token that repeats its input is a `PaginationLoop`.

mod strategies;
mod types;

pub use strategies::{
    parse_timestamp, CursorPaginator, NoPaginator, OffsetPaginator, PageNumberPaginator,
    PaginationDefinition, StopWhen, TimeWindowPaginator, UrlCursorPaginator,
};
pub use types::{
    advance, NextPage, Page, PageSizePolicy, PageState, PaginationFamily, Paginator,
    DEFAULT_PAGE_SIZE,
};

#[cfg(test)]
mod tests;
