//! Live metadata resolution
//!
//! Used when a provider ships no static schemas. Objects are resolved one
//! request each, either through a GraphQL `__type` query or by sampling the
//! first record of a list call; both produce [`ObjectMetadata`].

use super::inference::SampleInferrer;
use super::types::{FieldMetadata, ListObjectMetadataResult, ObjectMetadata, ValueType};
use crate::error::{Error, Result};
use crate::jsonquery::JsonQuery;
use crate::types::JsonValue;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use tracing::debug;

/// GraphQL query for a single type's fields
pub const TYPE_INTROSPECTION_QUERY: &str = "query IntrospectType($name: String!) { \
__type(name: $name) { name fields { name type { name kind ofType { name kind } } } } }";

/// Default number of concurrent requests in parallel mode
pub const DEFAULT_CONCURRENCY: usize = 4;

/// How per-object requests are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Serial,
    Parallel,
}

/// Variables for [`TYPE_INTROSPECTION_QUERY`]
pub fn type_query_variables(type_name: &str) -> JsonValue {
    json!({ "name": type_name })
}

/// Parse a `__type` introspection reply
///
/// A null `__type` means the schema has no such type and is reported as
/// `ObjectNotFound` for `object`.
pub fn parse_type_introspection(object: &str, body: &JsonValue) -> Result<ObjectMetadata> {
    let q = JsonQuery::new(body);
    let Some(type_obj) = q.object_optional("data.__type")? else {
        return Err(Error::ObjectNotFound {
            object: object.to_string(),
        });
    };
    let type_value = JsonValue::Object(type_obj.clone());
    let tq = JsonQuery::new(&type_value);

    let display_name = tq.str_with_default("name", object)?;
    let mut metadata = ObjectMetadata::new(display_name);

    for field in tq.array_optional("fields")?.into_iter().flatten() {
        let fq = JsonQuery::new(field);
        let name = fq.str_required("name")?;
        let provider_type = match fq.str_optional("type.name")? {
            Some(t) => t,
            None => fq.str_with_default("type.ofType.name", "")?,
        };
        let mut meta = FieldMetadata::new(
            name,
            ValueType::from_provider_type(provider_type),
            provider_type,
        );
        if fq.str_optional("type.kind")? == Some("NON_NULL") {
            meta.required = Some(true);
        }
        metadata.add_field(name, meta);
    }

    Ok(metadata)
}

/// Infer metadata from the first record of a list reply
///
/// An empty or missing record array leaves the object without fields.
pub fn parse_sample_response(
    object: &str,
    body: &JsonValue,
    records_path: &str,
    inferrer: &SampleInferrer,
) -> Result<ObjectMetadata> {
    let records = JsonQuery::new(body).array_optional(records_path)?;
    let metadata = match records.and_then(|r| r.first()) {
        Some(first) => inferrer.infer(object, first),
        None => ObjectMetadata::new(object),
    };
    Ok(metadata)
}

/// Resolve metadata for each name with `fetch`
///
/// Failures are recorded per object and never abort the others. Dropping
/// the returned future cancels every outstanding request.
pub async fn resolve_objects<F, Fut>(
    names: &[String],
    mode: FetchMode,
    concurrency: usize,
    fetch: F,
) -> ListObjectMetadataResult
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<ObjectMetadata>>,
{
    let mut out = ListObjectMetadataResult::new();
    match mode {
        FetchMode::Serial => {
            for name in names {
                let outcome = fetch(name.clone()).await;
                out.record(name.clone(), outcome);
            }
        }
        FetchMode::Parallel => {
            let limit = concurrency.max(1);
            debug!(objects = names.len(), concurrency = limit, "Resolving metadata in parallel");
            let outcomes: Vec<(String, Result<ObjectMetadata>)> = stream::iter(names.iter().cloned())
                .map(|name| {
                    let fut = fetch(name.clone());
                    async move { (name, fut.await) }
                })
                .buffer_unordered(limit)
                .collect()
                .await;
            for (name, outcome) in outcomes {
                out.record(name, outcome);
            }
        }
    }
    out
}
