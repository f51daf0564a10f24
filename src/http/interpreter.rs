//! Provider error interpretation
//!
//! A provider declares a [`FormatSwitch`]: an ordered list of templates, each
//! guarded by the keys that must be present in a JSON error body. The first
//! template whose keys all match deserializes the body and enriches the
//! coarse status-derived error with the provider's messages. When nothing
//! matches, the status-derived error is returned as is.

use crate::error::{Error, Result};
use crate::jsonquery::JsonQuery;
use crate::types::{value_to_string, JsonValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A deserialized provider error payload
pub trait CombineError: Send + Sync {
    /// Enrich a status-derived error with provider-supplied details
    fn combine(&self, base: Error) -> Error;
}

type TemplateFactory = Arc<dyn Fn(&JsonValue) -> Result<Box<dyn CombineError>> + Send + Sync>;

/// One entry of a format switch
#[derive(Clone)]
pub struct FormatTemplate {
    must_keys: Vec<String>,
    factory: TemplateFactory,
}

impl FormatTemplate {
    /// Template backed by a typed payload struct
    pub fn typed<T>(must_keys: &[&str]) -> Self
    where
        T: DeserializeOwned + CombineError + 'static,
    {
        Self {
            must_keys: must_keys.iter().map(|k| (*k).to_string()).collect(),
            factory: Arc::new(|body| {
                let payload: T = serde_json::from_value(body.clone())?;
                Ok(Box::new(payload) as Box<dyn CombineError>)
            }),
        }
    }

    /// Template that collects messages from JSON paths
    ///
    /// A `[]` in a path maps over an array: `errors[]` takes each string,
    /// `errors[].message` takes each element's `message`.
    pub fn messages(must_keys: Vec<String>, message_paths: Vec<String>) -> Self {
        let paths = Arc::new(message_paths);
        Self {
            must_keys,
            factory: Arc::new(move |body| {
                let mut messages = Vec::new();
                for path in paths.iter() {
                    collect_messages(body, path, &mut messages);
                }
                Ok(Box::new(MessageList(messages)) as Box<dyn CombineError>)
            }),
        }
    }

    fn matches(&self, body: &JsonValue) -> bool {
        body.is_object() && self.must_keys.iter().all(|k| has_key(body, k))
    }
}

impl std::fmt::Debug for FormatTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatTemplate")
            .field("must_keys", &self.must_keys)
            .finish_non_exhaustive()
    }
}

/// Messages pulled out of an error body
#[derive(Debug, Clone, Default)]
pub struct MessageList(pub Vec<String>);

impl CombineError for MessageList {
    fn combine(&self, base: Error) -> Error {
        base.with_details(self.0.iter().cloned())
    }
}

/// Declarative template as written in a provider definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTemplateDefinition {
    #[serde(default)]
    pub must_keys: Vec<String>,
    #[serde(default)]
    pub message_paths: Vec<String>,
}

/// Ordered list of error templates for one provider
#[derive(Debug, Clone, Default)]
pub struct FormatSwitch {
    templates: Vec<FormatTemplate>,
}

impl FormatSwitch {
    /// Create an empty switch (every error is returned unenriched)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from declarative definitions
    pub fn from_definitions(definitions: &[ErrorTemplateDefinition]) -> Self {
        Self {
            templates: definitions
                .iter()
                .map(|d| FormatTemplate::messages(d.must_keys.clone(), d.message_paths.clone()))
                .collect(),
        }
    }

    /// Append a template
    #[must_use]
    pub fn with(mut self, template: FormatTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the switch has no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Map a non-2xx response to an error
    pub fn interpret(&self, status: u16, body: &[u8]) -> Error {
        let base = Error::from_status(status);
        let Ok(json) = serde_json::from_slice::<JsonValue>(body) else {
            return base;
        };
        self.interpret_json(base, &json)
    }

    /// Enrich `base` from an already-parsed error body
    pub fn interpret_json(&self, base: Error, body: &JsonValue) -> Error {
        let Some(template) = self.templates.iter().find(|t| t.matches(body)) else {
            return base;
        };
        match (template.factory)(body) {
            Ok(payload) => payload.combine(base),
            Err(e) => {
                warn!(error = %e, "Error body matched a template but did not deserialize");
                base
            }
        }
    }
}

fn has_key(body: &JsonValue, path: &str) -> bool {
    let mut current = body;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn push_scalar(value: &JsonValue, out: &mut Vec<String>) {
    match value {
        JsonValue::Array(items) => items.iter().for_each(|v| push_scalar(v, out)),
        JsonValue::Object(_) | JsonValue::Null => {}
        other => out.push(value_to_string(other)),
    }
}

fn collect_messages(body: &JsonValue, path: &str, out: &mut Vec<String>) {
    let query = JsonQuery::new(body);
    match path.split_once("[]") {
        Some((head, tail)) => {
            let tail = tail.trim_start_matches('.');
            let Some(JsonValue::Array(items)) = query.value_optional(head) else {
                return;
            };
            for item in items {
                if tail.is_empty() {
                    push_scalar(item, out);
                } else {
                    collect_messages(item, tail, out);
                }
            }
        }
        None => {
            if let Some(value) = query.value_optional(path) {
                push_scalar(value, out);
            }
        }
    }
}
