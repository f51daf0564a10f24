//! Schema types
//!
//! The metadata shape every resolver produces, whether it comes from an
//! embedded schema, GraphQL introspection or a sampled record.

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Int,
    Float,
    #[serde(rename = "bool", alias = "boolean")]
    Boolean,
    Date,
    Datetime,
    SingleSelect,
    MultiSelect,
    #[default]
    Other,
}

impl ValueType {
    /// Map a provider type name through the lowercase introspection switch
    pub fn from_provider_type(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "float" | "number" | "decimal" => ValueType::Float,
            "int" | "integer" => ValueType::Int,
            "string" | "id" => ValueType::String,
            "boolean" | "bool" => ValueType::Boolean,
            "datetime" | "timestamp" | "timestamptz" => ValueType::Datetime,
            "date" | "timelessdate" => ValueType::Date,
            _ => ValueType::Other,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Boolean => "bool",
            ValueType::Date => "date",
            ValueType::Datetime => "datetime",
            ValueType::SingleSelect => "singleSelect",
            ValueType::MultiSelect => "multiSelect",
            ValueType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Metadata for one field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub display_name: String,
    pub value_type: ValueType,
    /// Type name as the provider reports it
    #[serde(default)]
    pub provider_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl FieldMetadata {
    /// Field with a display name equal to its key
    pub fn new(name: impl Into<String>, value_type: ValueType, provider_type: impl Into<String>) -> Self {
        Self {
            display_name: name.into(),
            value_type,
            provider_type: provider_type.into(),
            ..Default::default()
        }
    }
}

/// Metadata for one object
///
/// Every key of `fields` also appears in `fields_map`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub display_name: String,
    /// Field name → display name
    pub fields_map: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMetadata>,
}

impl ObjectMetadata {
    /// Empty metadata for an object
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Add a field, keeping `fields_map` in step
    pub fn add_field(&mut self, name: impl Into<String>, field: FieldMetadata) {
        let name = name.into();
        self.fields_map.insert(name.clone(), field.display_name.clone());
        self.fields.insert(name, field);
    }

    /// Repair the `fields` ⊆ `fields_map` invariant
    pub fn normalize(&mut self) {
        for (name, field) in &self.fields {
            self.fields_map
                .entry(name.clone())
                .or_insert_with(|| field.display_name.clone());
        }
    }

    /// Check the `fields` ⊆ `fields_map` invariant
    pub fn is_consistent(&self) -> bool {
        self.fields.keys().all(|k| self.fields_map.contains_key(k))
    }
}

/// Outcome of a metadata request over several objects
///
/// `result` and `errors` are disjoint and together cover every requested
/// name.
#[derive(Debug, Default)]
pub struct ListObjectMetadataResult {
    pub result: BTreeMap<String, ObjectMetadata>,
    pub errors: BTreeMap<String, Error>,
}

impl ListObjectMetadataResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved object
    pub fn insert(&mut self, name: impl Into<String>, metadata: ObjectMetadata) {
        let name = name.into();
        self.errors.remove(&name);
        self.result.insert(name, metadata);
    }

    /// Record a failed object
    pub fn insert_error(&mut self, name: impl Into<String>, error: Error) {
        let name = name.into();
        self.result.remove(&name);
        self.errors.insert(name, error);
    }

    /// Record one object's outcome
    pub fn record(&mut self, name: impl Into<String>, outcome: crate::error::Result<ObjectMetadata>) {
        match outcome {
            Ok(metadata) => self.insert(name, metadata),
            Err(error) => self.insert_error(name, error),
        }
    }

    /// Kind of the error recorded for an object
    pub fn error_kind(&self, name: &str) -> Option<ErrorKind> {
        self.errors.get(name).map(Error::kind)
    }

    /// JSON view for display: errors are rendered as `{kind, message}`
    pub fn to_json(&self) -> serde_json::Value {
        let errors: serde_json::Map<String, serde_json::Value> = self
            .errors
            .iter()
            .map(|(name, e)| {
                (
                    name.clone(),
                    serde_json::json!({"kind": e.kind().as_str(), "message": e.to_string()}),
                )
            })
            .collect();
        serde_json::json!({
            "result": serde_json::to_value(&self.result).unwrap_or_default(),
            "errors": errors,
        })
    }
}
