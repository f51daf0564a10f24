//! Handler contract between the connector core and a provider
//!
//! The core validates and executes; a provider only turns operation
//! parameters into requests and responses into results. Handlers are pure
//! and synchronous, which keeps every provider testable without a server.

use crate::connector::{
    DeleteParams, DeleteResult, Fields, ReadParams, ReadResult, ReadResultRow, WriteParams,
    WriteRecord, WriteResult,
};
use crate::endpoints::EndpointRegistry;
use crate::error::{Error, Result};
use crate::http::{FormatSwitch, HttpRequest, JsonResponse};
use crate::incremental::IncrementalFilter;
use crate::jsonquery::JsonQuery;
use crate::pagination::{PaginationFamily, Paginator};
use crate::schema::{ObjectMetadata, StaticSchemas};
use crate::template::{render, TemplateContext};
use crate::types::{Capability, JsonValue, ModuleId};
use crate::url_builder::UrlBuilder;
use std::collections::BTreeMap;

// ============================================================================
// Request Context
// ============================================================================

/// Everything a handler may consult while building or parsing
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub module: &'a ModuleId,
    /// Module root, already rendered
    pub base_url: &'a str,
    /// Connector metadata and post-auth variables
    pub vars: &'a TemplateContext,
    pub schemas: Option<&'a StaticSchemas>,
    /// Capability and alias lookups for the module
    pub endpoints: &'a EndpointRegistry,
    pub encoding_exceptions: &'a BTreeMap<String, String>,
}

impl<'a> RequestContext<'a> {
    /// Render a template against the context variables
    pub fn render(&self, template: &str) -> Result<String> {
        render(template, self.vars)
    }

    /// Render a template with extra variables such as `{id}`
    pub fn render_with(&self, template: &str, extra: &[(&str, &str)]) -> Result<String> {
        if extra.is_empty() {
            return self.render(template);
        }
        let mut vars = self.vars.clone();
        vars.extend_strings(extra.iter().copied());
        render(template, &vars)
    }

    /// URL for a path template under the module root
    ///
    /// Absolute URLs are used as they are.
    pub fn url(&self, path: &str) -> Result<UrlBuilder> {
        self.url_with(path, &[])
    }

    /// URL for a path template with extra variables
    pub fn url_with(&self, path: &str, extra: &[(&str, &str)]) -> Result<UrlBuilder> {
        let path = self.render_with(path, extra)?;
        let mut url = if UrlBuilder::is_absolute(&path) {
            UrlBuilder::parse(&path)?
        } else {
            UrlBuilder::new(self.base_url, &[&path])?
        };
        url.add_encoding_exceptions(self.encoding_exceptions.clone());
        Ok(url)
    }

    /// Provider path of an object: the schema's `urlPath`, else its alias
    pub fn resolve_endpoint(&self, object: &str) -> String {
        self.schemas
            .and_then(|s| s.lookup_url_path(self.module, object))
            .unwrap_or_else(|| self.endpoints.resolve_endpoint(self.module, object))
    }

    /// Records key from the static schemas, or the object name
    pub fn array_field_name(&self, object: &str) -> String {
        match self.schemas {
            Some(schemas) => schemas.lookup_array_field_name(self.module, object),
            None => object.to_string(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Request builders and response parsers for one provider
///
/// Variation is per provider; per-object differences live in lookup tables
/// inside the implementation. The optional batch and by-ids pairs default
/// to "not offered", in which case the core falls back to single-record
/// calls.
pub trait ProviderHandlers: Send + Sync + std::fmt::Debug {
    /// Error format switch installed on the client
    fn error_format(&self) -> FormatSwitch {
        FormatSwitch::new()
    }

    /// Build one page request; `page_size` is already resolved
    fn build_read_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &ReadParams,
        page_size: usize,
    ) -> Result<HttpRequest>;

    /// Parse one page
    fn parse_read_response(
        &self,
        ctx: &RequestContext<'_>,
        params: &ReadParams,
        page_size: usize,
        body: &JsonValue,
    ) -> Result<ReadResult>;

    fn build_write_request(&self, ctx: &RequestContext<'_>, params: &WriteParams)
        -> Result<HttpRequest>;

    fn parse_write_response(
        &self,
        ctx: &RequestContext<'_>,
        params: &WriteParams,
        response: &JsonResponse,
    ) -> Result<WriteResult>;

    fn build_delete_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &DeleteParams,
    ) -> Result<HttpRequest>;

    fn parse_delete_response(
        &self,
        ctx: &RequestContext<'_>,
        params: &DeleteParams,
        response: &JsonResponse,
    ) -> Result<DeleteResult>;

    /// Request resolving live metadata for one object
    fn build_metadata_request(&self, ctx: &RequestContext<'_>, object: &str)
        -> Result<HttpRequest>;

    fn parse_metadata_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        body: &JsonValue,
    ) -> Result<ObjectMetadata>;

    /// Request for one record by id
    fn build_record_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<HttpRequest>;

    fn parse_record_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        fields: &Fields,
        body: &JsonValue,
    ) -> Result<ReadResultRow>;

    /// Records per batch-write request, if the provider has a batch endpoint
    fn batch_limit(&self, _ctx: &RequestContext<'_>, _object: &str) -> Option<usize> {
        None
    }

    fn build_batch_write_request(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        _records: &[WriteRecord],
    ) -> Result<HttpRequest> {
        Err(Error::not_supported(object, Capability::Write))
    }

    /// Per-record outcomes, in request order
    fn parse_batch_write_response(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        _records: &[WriteRecord],
        _response: &JsonResponse,
    ) -> Result<Vec<Result<WriteResult>>> {
        Err(Error::not_supported(object, Capability::Write))
    }

    /// Whether one request can fetch many records by id
    fn supports_records_by_ids(&self, _ctx: &RequestContext<'_>, _object: &str) -> bool {
        false
    }

    fn build_records_by_ids_request(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        _ids: &[String],
        _fields: &Fields,
    ) -> Result<HttpRequest> {
        Err(Error::not_supported(object, Capability::Read))
    }

    /// Rows found; ids without a row are reported missing by the core
    fn parse_records_by_ids_response(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        _fields: &Fields,
        _body: &JsonValue,
    ) -> Result<Vec<ReadResultRow>> {
        Err(Error::not_supported(object, Capability::Read))
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Records array at `path`
///
/// Plain paths require the key and an array. `$`-prefixed paths are
/// evaluated as JSONPath and must match; `$.items[*]` over an empty
/// `items` array is an empty page, not a missing key.
pub fn extract_records(body: &JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    if path.starts_with('$') {
        return extract_with_jsonpath(body, path);
    }
    Ok(JsonQuery::new(body).array_required(path)?.clone())
}

fn extract_with_jsonpath(body: &JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath '{path}': {e}"),
    })?;

    match jp.find(body) {
        JsonValue::Array(found) => match found.as_slice() {
            // `$.items` yields the array itself as one match
            [JsonValue::Array(inner)] => Ok(inner.clone()),
            [] => {
                let empty_parent = path
                    .strip_suffix("[*]")
                    .is_some_and(|parent| {
                        extract_with_jsonpath(body, parent).is_ok_and(|v| v.is_empty())
                    });
                if empty_parent {
                    Ok(Vec::new())
                } else {
                    Err(Error::KeyNotFound { key: path.to_string() })
                }
            }
            _ => Ok(found),
        },
        JsonValue::Null => Err(Error::KeyNotFound { key: path.to_string() }),
        other => Ok(vec![other]),
    }
}

/// Write the time window and the page position into a list request
///
/// The window is applied on the first page only. Replays carry it in the
/// provider's cursor, except for time-window pagination where the token
/// replaces `since` and `until` is re-sent.
pub fn apply_window_and_cursor(
    req: &mut HttpRequest,
    paginator: &dyn Paginator,
    incremental: Option<&IncrementalFilter>,
    params: &ReadParams,
    page_size: usize,
) -> Result<()> {
    match params.token() {
        None => {
            if let Some(filter) = incremental {
                filter.apply(req, params.since.as_ref(), params.until.as_ref())?;
            }
            paginator.apply(req, page_size, None)
        }
        Some(token) => {
            if paginator.family() == PaginationFamily::TimeWindow {
                if let Some(filter) = incremental {
                    filter.apply(req, None, params.until.as_ref())?;
                }
            }
            paginator.apply(req, page_size, Some(token))
        }
    }
}

/// Messages of a GraphQL-style `errors` array
pub fn error_messages(errors: &[JsonValue]) -> Vec<String> {
    errors
        .iter()
        .map(|e| match e {
            JsonValue::String(s) => s.clone(),
            other => JsonQuery::new(other)
                .str_optional("message")
                .ok()
                .flatten()
                .map_or_else(|| other.to_string(), str::to_string),
        })
        .collect()
}
