//! Field metadata inference from sample records

use super::types::{FieldMetadata, ObjectMetadata, ValueType};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").expect("valid datetime regex")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// Infers object metadata from records returned by a list call
#[derive(Debug, Clone, Default)]
pub struct SampleInferrer {
    /// Classify ISO 8601 strings as dates and datetimes
    detect_datetime: bool,
}

impl SampleInferrer {
    /// Create an inferrer with the plain type switch
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable datetime detection
    #[must_use]
    pub fn with_datetime_detection(mut self, enabled: bool) -> Self {
        self.detect_datetime = enabled;
        self
    }

    /// Infer metadata from one record
    ///
    /// Non-object records produce metadata without fields.
    pub fn infer(&self, display_name: &str, record: &Value) -> ObjectMetadata {
        let mut metadata = ObjectMetadata::new(display_name);
        if let Value::Object(map) = record {
            for (key, value) in map {
                let (value_type, provider_type) = self.classify(value);
                metadata.add_field(key, FieldMetadata::new(key, value_type, provider_type));
            }
        }
        metadata
    }

    /// Infer metadata from several records
    ///
    /// The first record that carries a non-null value decides a field's
    /// type; fields seen with two different types become `other`.
    pub fn infer_from_records(&self, display_name: &str, records: &[Value]) -> ObjectMetadata {
        let mut metadata = ObjectMetadata::new(display_name);
        for record in records {
            let Value::Object(map) = record else { continue };
            for (key, value) in map {
                let (value_type, provider_type) = self.classify(value);
                match metadata.fields.get_mut(key) {
                    None => {
                        metadata.add_field(key, FieldMetadata::new(key, value_type, provider_type));
                    }
                    Some(existing) if existing.provider_type == "null" => {
                        existing.value_type = value_type;
                        existing.provider_type = provider_type.to_string();
                    }
                    Some(existing) => {
                        if provider_type != "null" && existing.value_type != value_type {
                            existing.value_type = ValueType::Other;
                        }
                    }
                }
            }
        }
        metadata
    }

    fn classify(&self, value: &Value) -> (ValueType, &'static str) {
        match value {
            Value::String(s) if self.detect_datetime && DATETIME_RE.is_match(s) => {
                (ValueType::Datetime, "string")
            }
            Value::String(s) if self.detect_datetime && DATE_RE.is_match(s) => {
                (ValueType::Date, "string")
            }
            Value::String(_) => (ValueType::String, "string"),
            Value::Number(_) => (ValueType::Float, "number"),
            Value::Bool(_) => (ValueType::Boolean, "boolean"),
            Value::Null => (ValueType::Other, "null"),
            Value::Array(_) => (ValueType::Other, "array"),
            Value::Object(_) => (ValueType::Other, "object"),
        }
    }
}

/// Infer metadata from a single sample record
pub fn infer_metadata(display_name: &str, record: &Value) -> ObjectMetadata {
    SampleInferrer::new().infer(display_name, record)
}
