//! Embedded static schemas
//!
//! Documents are shaped per module, with a small header and one entry per
//! object:
//!
//! ```json
//! {
//!   "modules": {
//!     "root": {
//!       "id": "root",
//!       "path": "/v2",
//!       "data": {
//!         "calls": {
//!           "displayName": "Calls",
//!           "responseKey": "calls",
//!           "fieldsMap": { "id": "ID" },
//!           "fields": { "id": { "displayName": "ID", "valueType": "string" } }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use super::types::{ListObjectMetadataResult, ObjectMetadata};
use crate::error::{Error, Result};
use crate::types::{normalize_object_name, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One object entry of a static schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    pub display_name: String,
    /// JSON key holding the records array in list responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,
    /// URL path of the object when it differs from its name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    pub fields_map: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, super::FieldMetadata>,
}

impl ObjectSchema {
    /// Metadata view of this entry
    pub fn metadata(&self) -> ObjectMetadata {
        let mut metadata = ObjectMetadata {
            display_name: self.display_name.clone(),
            fields_map: self.fields_map.clone(),
            fields: self.fields.clone(),
        };
        metadata.normalize();
        metadata
    }
}

/// Schemas of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSchemas {
    pub id: ModuleId,
    /// Path prefix shared by the module's objects
    #[serde(default)]
    pub path: String,
    pub data: BTreeMap<String, ObjectSchema>,
}

/// Registry of embedded schemas; immutable after load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSchemas {
    pub modules: BTreeMap<ModuleId, ModuleSchemas>,
}

impl StaticSchemas {
    /// Parse an embedded JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let schemas: Self = serde_json::from_str(json)?;
        for (key, module) in &schemas.modules {
            if key != &module.id {
                return Err(Error::config(format!(
                    "schema module key '{key}' does not match its id '{}'",
                    module.id
                )));
            }
        }
        Ok(schemas)
    }

    /// Serialize back to the embedded layout
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check whether a module has schemas
    pub fn has_module(&self, module: &ModuleId) -> bool {
        self.modules.contains_key(module)
    }

    /// Object names of a module
    pub fn object_names(&self, module: &ModuleId) -> BTreeSet<String> {
        self.modules
            .get(module)
            .map(|m| m.data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Schema entry of an object
    pub fn object(&self, module: &ModuleId, object: &str) -> Option<&ObjectSchema> {
        self.modules
            .get(module)?
            .data
            .get(&normalize_object_name(object))
    }

    /// JSON key under which list responses carry the records
    ///
    /// Falls back to the object name.
    pub fn lookup_array_field_name(&self, module: &ModuleId, object: &str) -> String {
        self.object(module, object)
            .and_then(|o| o.response_key.clone())
            .unwrap_or_else(|| normalize_object_name(object))
    }

    /// URL path declared for an object, if any
    pub fn lookup_url_path(&self, module: &ModuleId, object: &str) -> Option<String> {
        self.object(module, object).and_then(|o| o.url_path.clone())
    }

    /// Metadata for the named objects
    ///
    /// Unknown names are reported per object as `ObjectNotFound`; blank
    /// names are reported under the name as given.
    pub fn select(&self, module: &ModuleId, names: &[String]) -> Result<ListObjectMetadataResult> {
        if names.is_empty() {
            return Err(Error::MissingObjects);
        }
        let mut out = ListObjectMetadataResult::new();
        for name in names {
            let key = normalize_object_name(name);
            if key.is_empty() {
                out.insert_error(name.clone(), Error::ObjectNotFound { object: name.clone() });
                continue;
            }
            match self.object(module, &key) {
                Some(schema) => out.insert(key, schema.metadata()),
                None => out.insert_error(key.clone(), Error::ObjectNotFound { object: key }),
            }
        }
        Ok(out)
    }
}
