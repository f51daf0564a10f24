//! Operation parameters and results

use crate::error::{Error, Result};
use crate::jsonquery::JsonQuery;
use crate::pagination::NextPage;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Fields
// ============================================================================

/// Fields requested from a read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fields {
    /// `"*"`: every field of the record
    #[default]
    All,
    /// Named fields; dotted names traverse nested objects
    Set(BTreeSet<String>),
}

impl Fields {
    /// Request every field
    pub fn all() -> Self {
        Self::All
    }

    /// Request the named fields
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(names.into_iter().map(Into::into).collect())
    }

    /// Parse `*` or a comma-separated list
    pub fn parse(s: &str) -> Self {
        if s.trim() == "*" {
            return Self::All;
        }
        Self::of(
            s.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        )
    }

    /// An empty set requests nothing
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Set(set) if set.is_empty())
    }

    /// Project a record onto the requested fields
    ///
    /// Requested fields the record lacks are left out.
    pub fn project(&self, record: &JsonValue) -> JsonObject {
        match self {
            Self::All => record.as_object().cloned().unwrap_or_default(),
            Self::Set(names) => {
                let q = JsonQuery::new(record);
                names
                    .iter()
                    .filter_map(|name| q.value_optional(name).map(|v| (name.clone(), v.clone())))
                    .collect()
            }
        }
    }

    /// Top-level names, for providers that need an explicit selection
    pub fn names(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::All => None,
            Self::Set(names) => Some(names),
        }
    }
}

// ============================================================================
// Read
// ============================================================================

/// Parameters of a read call
#[derive(Debug, Clone, Default)]
pub struct ReadParams {
    pub object_name: String,
    pub fields: Fields,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page_size: Option<usize>,
    /// Token from a previous page; `""` is the same as none
    pub next_page: Option<String>,
    pub associated_objects: Vec<String>,
    /// Provider filter expression passed through untouched
    pub filter: Option<String>,
}

impl ReadParams {
    /// Read `fields` of an object
    pub fn new(object_name: impl Into<String>, fields: Fields) -> Self {
        Self {
            object_name: object_name.into(),
            fields,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn next_page(mut self, token: impl Into<String>) -> Self {
        self.next_page = Some(token.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn associated(mut self, objects: Vec<String>) -> Self {
        self.associated_objects = objects;
        self
    }

    /// Replay token, if this is not the first page
    pub fn token(&self) -> Option<&str> {
        self.next_page.as_deref().filter(|t| !t.is_empty())
    }
}

/// One record of a read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResultRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Requested fields only
    pub fields: JsonObject,
    /// The whole record
    pub raw: JsonObject,
}

impl ReadResultRow {
    /// Build a row from a provider record
    pub fn from_record(record: &JsonValue, fields: &Fields, id_path: &str) -> Self {
        Self {
            id: JsonQuery::new(record).id_optional(id_path),
            fields: fields.project(record),
            raw: record.as_object().cloned().unwrap_or_default(),
        }
    }
}

/// One page of a read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub rows: usize,
    pub data: Vec<ReadResultRow>,
    /// Token for the next page; `""` when done
    pub next_page: String,
    pub done: bool,
}

impl ReadResult {
    /// Assemble a page
    pub fn new(data: Vec<ReadResultRow>, next: NextPage) -> Self {
        let next_page = next.into_token();
        Self {
            rows: data.len(),
            done: next_page.is_empty(),
            next_page,
            data,
        }
    }
}

// ============================================================================
// Write
// ============================================================================

/// Parameters of a write call
#[derive(Debug, Clone, Default)]
pub struct WriteParams {
    pub object_name: String,
    /// Empty for a create
    pub record_id: String,
    pub record_data: JsonValue,
}

impl WriteParams {
    /// Create a record
    pub fn create(object_name: impl Into<String>, record_data: JsonValue) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: String::new(),
            record_data,
        }
    }

    /// Update a record
    pub fn update(
        object_name: impl Into<String>,
        record_id: impl Into<String>,
        record_data: JsonValue,
    ) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: record_id.into(),
            record_data,
        }
    }

    /// Whether this write creates a record
    pub fn is_create(&self) -> bool {
        self.record_id.is_empty()
    }
}

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonObject>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl WriteResult {
    /// Successful write
    pub fn success(record_id: impl Into<String>, data: Option<JsonObject>) -> Self {
        Self {
            success: true,
            record_id: record_id.into(),
            data,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Delete
// ============================================================================

/// Parameters of a delete call
#[derive(Debug, Clone, Default)]
pub struct DeleteParams {
    pub object_name: String,
    pub record_id: String,
}

impl DeleteParams {
    /// Delete one record
    pub fn new(object_name: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: record_id.into(),
        }
    }
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub success: bool,
}

// ============================================================================
// Batch write & records by ids
// ============================================================================

/// One record of a batch write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Empty for a create
    pub record_id: String,
    pub record_data: JsonValue,
}

impl WriteRecord {
    /// Record to create
    pub fn create(record_data: JsonValue) -> Self {
        Self {
            record_id: String::new(),
            record_data,
        }
    }

    /// Record to update
    pub fn update(record_id: impl Into<String>, record_data: JsonValue) -> Self {
        Self {
            record_id: record_id.into(),
            record_data,
        }
    }
}

/// Parameters of a batch write
#[derive(Debug, Clone, Default)]
pub struct BatchWriteParams {
    pub object_name: String,
    pub records: Vec<WriteRecord>,
    /// Chunks in flight at once; 1 issues them serially
    pub concurrency: usize,
}

impl BatchWriteParams {
    /// Batch over an object, issued serially
    pub fn new(object_name: impl Into<String>, records: Vec<WriteRecord>) -> Self {
        Self {
            object_name: object_name.into(),
            records,
            concurrency: 1,
        }
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Per-record outcomes of a batch write, in input order
#[derive(Debug, Default)]
pub struct BatchWriteResult {
    pub results: Vec<Result<WriteResult>>,
}

impl BatchWriteResult {
    /// Records written
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Records that failed
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// JSON view for display
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.results.iter().map(outcome_json).collect())
    }
}

/// Per-id outcomes of a records-by-ids call, in input order
#[derive(Debug, Default)]
pub struct RecordsByIdsResult {
    pub results: Vec<(String, Result<ReadResultRow>)>,
}

impl RecordsByIdsResult {
    /// Rows that were found
    pub fn found(&self) -> impl Iterator<Item = &ReadResultRow> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    /// Ids that failed, with their errors
    pub fn errors(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id.as_str(), e)))
    }

    /// JSON view for display
    pub fn to_json(&self) -> JsonValue {
        let map: JsonObject = self
            .results
            .iter()
            .map(|(id, r)| (id.clone(), outcome_json(r)))
            .collect();
        JsonValue::Object(map)
    }
}

fn outcome_json<T: Serialize>(outcome: &Result<T>) -> JsonValue {
    match outcome {
        Ok(value) => serde_json::to_value(value).unwrap_or(JsonValue::Null),
        Err(e) => json!({"error": {"kind": e.kind().as_str(), "message": e.to_string()}}),
    }
}

// ============================================================================
// Post-auth bootstrap
// ============================================================================

/// Identifiers discovered after authentication
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthInfo {
    /// Variables substituted into endpoint templates
    pub catalog_vars: BTreeMap<String, String>,
    pub raw_response: JsonValue,
}
