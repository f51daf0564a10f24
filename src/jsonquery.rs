//! Typed lookups into parsed JSON
//!
//! Paths are dotted (`data.issues.nodes`); a trailing `[]` is accepted and
//! ignored so record paths can be written as `records[]`. An empty path
//! addresses the root. JSON `null` is treated as missing.
//!
//! Missing keys and wrong types are reported as different errors: optional
//! lookups swallow the former and always surface the latter.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};

/// Read-only view over a JSON value
#[derive(Debug, Clone, Copy)]
pub struct JsonQuery<'a> {
    root: &'a JsonValue,
}

fn normalize(path: &str) -> &str {
    path.trim().trim_end_matches("[]").trim_matches('.')
}

impl<'a> JsonQuery<'a> {
    /// Wrap a parsed JSON value
    pub fn new(root: &'a JsonValue) -> Self {
        Self { root }
    }

    /// Resolve a path, treating `null` as missing
    pub fn value_optional(&self, path: &str) -> Option<&'a JsonValue> {
        let path = normalize(path);
        if path.is_empty() {
            return (!self.root.is_null()).then_some(self.root);
        }
        let mut current = self.root;
        for segment in path.split('.') {
            let segment = segment.trim_end_matches("[]");
            current = match current {
                JsonValue::Object(map) => map.get(segment)?,
                JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    fn value_required(&self, path: &str) -> Result<&'a JsonValue> {
        self.value_optional(path).ok_or_else(|| Error::KeyNotFound {
            key: path.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------------

    /// Array at `path`; missing is an error
    pub fn array_required(&self, path: &str) -> Result<&'a Vec<JsonValue>> {
        let value = self.value_required(path)?;
        value.as_array().ok_or_else(|| Error::NotArray {
            key: path.to_string(),
        })
    }

    /// Array at `path`, or `None` if missing
    pub fn array_optional(&self, path: &str) -> Result<Option<&'a Vec<JsonValue>>> {
        match self.value_optional(path) {
            None => Ok(None),
            Some(JsonValue::Array(items)) => Ok(Some(items)),
            Some(_) => Err(Error::NotArray {
                key: path.to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    /// Object at `path`; missing is an error
    pub fn object_required(&self, path: &str) -> Result<&'a JsonObject> {
        let value = self.value_required(path)?;
        value.as_object().ok_or_else(|| Error::NotObject {
            key: path.to_string(),
        })
    }

    /// Object at `path`, or `None` if missing
    pub fn object_optional(&self, path: &str) -> Result<Option<&'a JsonObject>> {
        match self.value_optional(path) {
            None => Ok(None),
            Some(JsonValue::Object(map)) => Ok(Some(map)),
            Some(_) => Err(Error::NotObject {
                key: path.to_string(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------------

    /// String at `path`; missing is an error
    pub fn str_required(&self, path: &str) -> Result<&'a str> {
        let value = self.value_required(path)?;
        value.as_str().ok_or_else(|| Error::NotString {
            key: path.to_string(),
        })
    }

    /// String at `path`, or `None` if missing
    pub fn str_optional(&self, path: &str) -> Result<Option<&'a str>> {
        match self.value_optional(path) {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(Error::NotString {
                key: path.to_string(),
            }),
        }
    }

    /// String at `path`, or `default` if missing
    pub fn str_with_default(&self, path: &str, default: &'a str) -> Result<&'a str> {
        Ok(self.str_optional(path)?.unwrap_or(default))
    }

    /// Integer at `path`; missing is an error
    pub fn integer_required(&self, path: &str) -> Result<i64> {
        self.integer_optional(path)?.ok_or_else(|| Error::KeyNotFound {
            key: path.to_string(),
        })
    }

    /// Integer at `path`, or `None` if missing
    ///
    /// Floats with no fractional part are accepted.
    pub fn integer_optional(&self, path: &str) -> Result<Option<i64>> {
        let Some(value) = self.value_optional(path) else {
            return Ok(None);
        };
        let not_numeric = || Error::NotNumeric {
            key: path.to_string(),
        };
        match value {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
                        _ => Err(not_numeric()),
                    }
                }
            }
            _ => Err(not_numeric()),
        }
    }

    /// Integer at `path`, or `default` if missing
    pub fn integer_with_default(&self, path: &str, default: i64) -> Result<i64> {
        Ok(self.integer_optional(path)?.unwrap_or(default))
    }

    /// Boolean at `path`, or `None` if missing
    pub fn bool_optional(&self, path: &str) -> Result<Option<bool>> {
        match self.value_optional(path) {
            None => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(Error::NotBool {
                key: path.to_string(),
            }),
        }
    }

    /// Boolean at `path`, or `default` if missing
    pub fn bool_with_default(&self, path: &str, default: bool) -> Result<bool> {
        Ok(self.bool_optional(path)?.unwrap_or(default))
    }

    /// Record id at `path`: integer first, then string
    ///
    /// Returns `None` when the path is missing or holds another type.
    pub fn id_optional(&self, path: &str) -> Option<String> {
        if let Ok(Some(id)) = self.integer_optional(path) {
            return Some(id.to_string());
        }
        match self.str_optional(path) {
            Ok(Some(s)) if !s.is_empty() => Some(s.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonValue {
        json!({
            "data": {
                "issues": {
                    "nodes": [{"id": "a"}, {"id": "b"}],
                    "pageInfo": {"hasNextPage": true, "endCursor": "xyz"}
                }
            },
            "records": {"totalRecords": 12, "currentPageSize": 0},
            "ratio": 2.0,
            "name": "calls",
            "empty": null,
            "id": 42
        })
    }

    #[test]
    fn test_array_required() {
        let value = sample();
        let q = JsonQuery::new(&value);
        assert_eq!(q.array_required("data.issues.nodes").unwrap().len(), 2);
        assert_eq!(q.array_required("data.issues.nodes[]").unwrap().len(), 2);

        let err = q.array_required("data.missing").unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));

        let err = q.array_required("records").unwrap_err();
        assert!(matches!(err, Error::NotArray { .. }));
    }

    #[test]
    fn test_array_optional() {
        let value = sample();
        let q = JsonQuery::new(&value);
        assert!(q.array_optional("nope").unwrap().is_none());
        assert!(q.array_optional("empty").unwrap().is_none());
        assert!(q.array_optional("name").is_err());
    }

    #[test]
    fn test_root_path() {
        let value = json!([{"id": 1}]);
        let q = JsonQuery::new(&value);
        assert_eq!(q.array_required("").unwrap().len(), 1);
        assert_eq!(q.array_required("[]").unwrap().len(), 1);
    }

    #[test]
    fn test_scalars() {
        let value = sample();
        let q = JsonQuery::new(&value);
        assert_eq!(q.str_required("data.issues.pageInfo.endCursor").unwrap(), "xyz");
        assert_eq!(q.bool_optional("data.issues.pageInfo.hasNextPage").unwrap(), Some(true));
        assert_eq!(q.integer_with_default("records.totalRecords", 0).unwrap(), 12);
        assert_eq!(q.integer_with_default("records.missing", 7).unwrap(), 7);
        assert_eq!(q.integer_optional("ratio").unwrap(), Some(2));
        assert_eq!(q.str_with_default("nope", "dflt").unwrap(), "dflt");

        assert!(matches!(q.integer_optional("name"), Err(Error::NotNumeric { .. })));
        assert!(matches!(q.str_optional("id"), Err(Error::NotString { .. })));
        assert!(matches!(q.bool_optional("name"), Err(Error::NotBool { .. })));
        assert!(matches!(q.object_required("name"), Err(Error::NotObject { .. })));
    }

    #[test]
    fn test_array_index_segment() {
        let value = sample();
        let q = JsonQuery::new(&value);
        assert_eq!(q.str_required("data.issues.nodes.1.id").unwrap(), "b");
    }

    #[test]
    fn test_id_optional() {
        let value = json!({"id": 42, "sid": "abc", "obj": {"x": 1}});
        let q = JsonQuery::new(&value);
        assert_eq!(q.id_optional("id").as_deref(), Some("42"));
        assert_eq!(q.id_optional("sid").as_deref(), Some("abc"));
        assert_eq!(q.id_optional("obj"), None);
        assert_eq!(q.id_optional("missing"), None);
    }
}
