//! Schema tests

use super::*;
use crate::error::{Error, ErrorKind};
use crate::types::ModuleId;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use test_case::test_case;

const SCHEMAS: &str = r#"{
  "modules": {
    "root": {
      "id": "root",
      "path": "/v2",
      "data": {
        "calls": {
          "displayName": "Calls",
          "fieldsMap": { "id": "ID", "title": "Title" },
          "fields": {
            "id": { "displayName": "ID", "valueType": "string", "providerType": "string" },
            "title": { "displayName": "Title", "valueType": "string", "providerType": "string" }
          }
        },
        "users": {
          "displayName": "Users",
          "responseKey": "users",
          "urlPath": "users/list",
          "fieldsMap": { "id": "ID", "active": "Active" }
        }
      }
    }
  }
}"#;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

// ============================================================================
// Value types
// ============================================================================

#[test_case("Float", ValueType::Float)]
#[test_case("String", ValueType::String)]
#[test_case("ID", ValueType::String)]
#[test_case("Boolean", ValueType::Boolean)]
#[test_case("Int", ValueType::Int)]
#[test_case("DateTime", ValueType::Datetime)]
#[test_case("TimelessDate", ValueType::Date)]
#[test_case("IssueConnection", ValueType::Other)]
#[test_case("", ValueType::Other)]
fn test_provider_type_switch(name: &str, expected: ValueType) {
    assert_eq!(ValueType::from_provider_type(name), expected);
}

#[test]
fn test_value_type_serde_names() {
    assert_eq!(serde_json::to_value(ValueType::Boolean).unwrap(), json!("bool"));
    assert_eq!(serde_json::to_value(ValueType::SingleSelect).unwrap(), json!("singleSelect"));
    let parsed: ValueType = serde_json::from_value(json!("boolean")).unwrap();
    assert_eq!(parsed, ValueType::Boolean);
}

#[test]
fn test_metadata_invariant_repaired() {
    let mut metadata = ObjectMetadata::new("Things");
    metadata
        .fields
        .insert("name".into(), FieldMetadata::new("Name", ValueType::String, "string"));
    assert!(!metadata.is_consistent());
    metadata.normalize();
    assert!(metadata.is_consistent());
    assert_eq!(metadata.fields_map["name"], "Name");
}

// ============================================================================
// Static registry
// ============================================================================

#[test]
fn test_static_registry_lookups() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let root = ModuleId::root();

    assert!(schemas.has_module(&root));
    assert_eq!(
        schemas.object_names(&root).into_iter().collect::<Vec<_>>(),
        vec!["calls".to_string(), "users".to_string()]
    );
    assert_eq!(schemas.lookup_array_field_name(&root, "users"), "users");
    assert_eq!(schemas.lookup_array_field_name(&root, "Calls"), "calls");
    assert_eq!(schemas.lookup_array_field_name(&root, "unknown"), "unknown");
    assert_eq!(schemas.lookup_url_path(&root, "users").as_deref(), Some("users/list"));
    assert!(schemas.object_names(&ModuleId::new("crm")).is_empty());
}

#[test]
fn test_static_registry_partial_failure() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let result = schemas
        .select(&ModuleId::root(), &names(&["calls", "butterflies"]))
        .unwrap();

    assert_eq!(result.result.keys().collect::<Vec<_>>(), vec!["calls"]);
    assert_eq!(result.result["calls"].fields_map["title"], "Title");
    assert_eq!(result.error_kind("butterflies"), Some(ErrorKind::ObjectNotFound));
    assert!(!result.result.contains_key("butterflies"));
}

#[test]
fn test_static_registry_reports_blank_names() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let result = schemas
        .select(&ModuleId::root(), &names(&["calls", " "]))
        .unwrap();
    assert_eq!(result.result.keys().collect::<Vec<_>>(), vec!["calls"]);
    assert_eq!(result.error_kind(" "), Some(ErrorKind::ObjectNotFound));
}

#[test]
fn test_static_registry_requires_names() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let err = schemas.select(&ModuleId::root(), &[]).unwrap_err();
    assert!(matches!(err, Error::MissingObjects));
}

#[test]
fn test_static_registry_fills_fields_map() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let result = schemas.select(&ModuleId::root(), &names(&["users"])).unwrap();
    let users = &result.result["users"];
    assert!(users.fields.is_empty());
    assert!(users.is_consistent());
    assert_eq!(users.fields_map.len(), 2);
}

#[test]
fn test_static_registry_round_trip_through_file() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(schemas.to_json_pretty().unwrap().as_bytes())
        .unwrap();

    let reloaded =
        StaticSchemas::from_json(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(reloaded, schemas);
}

#[test]
fn test_static_registry_rejects_mismatched_module_id() {
    let doc = r#"{"modules": {"root": {"id": "crm", "data": {}}}}"#;
    assert!(StaticSchemas::from_json(doc).is_err());
}

#[test]
fn test_to_json_shows_error_kinds() {
    let schemas = StaticSchemas::from_json(SCHEMAS).unwrap();
    let result = schemas
        .select(&ModuleId::root(), &names(&["calls", "butterflies"]))
        .unwrap();
    let view = result.to_json();
    assert_eq!(view["errors"]["butterflies"]["kind"], json!("object not found"));
    assert_eq!(view["result"]["calls"]["displayName"], json!("Calls"));
}

// ============================================================================
// Sample-record inference
// ============================================================================

#[test]
fn test_infer_plain_types() {
    let record = json!({
        "name": "Ada",
        "age": 36,
        "score": 4.5,
        "active": true,
        "tags": ["a"],
        "owner": {"id": 1},
        "deleted": null
    });
    let metadata = infer_metadata("people", &record);

    assert_eq!(metadata.display_name, "people");
    assert_eq!(metadata.fields["name"].value_type, ValueType::String);
    assert_eq!(metadata.fields["age"].value_type, ValueType::Float);
    assert_eq!(metadata.fields["score"].value_type, ValueType::Float);
    assert_eq!(metadata.fields["active"].value_type, ValueType::Boolean);
    assert_eq!(metadata.fields["tags"].value_type, ValueType::Other);
    assert_eq!(metadata.fields["owner"].value_type, ValueType::Other);
    assert_eq!(metadata.fields["deleted"].value_type, ValueType::Other);
    assert!(metadata.is_consistent());
}

#[test]
fn test_infer_datetime_detection() {
    let record = json!({"createdAt": "2024-11-01T00:00:00Z", "birthday": "1990-02-03"});

    let plain = SampleInferrer::new().infer("x", &record);
    assert_eq!(plain.fields["createdAt"].value_type, ValueType::String);

    let detecting = SampleInferrer::new()
        .with_datetime_detection(true)
        .infer("x", &record);
    assert_eq!(detecting.fields["createdAt"].value_type, ValueType::Datetime);
    assert_eq!(detecting.fields["birthday"].value_type, ValueType::Date);
}

#[test]
fn test_infer_from_records_merges() {
    let records = vec![
        json!({"id": "1", "amount": null, "flag": true}),
        json!({"id": "2", "amount": 10, "flag": "yes", "extra": 1}),
    ];
    let metadata = SampleInferrer::new().infer_from_records("deals", &records);

    assert_eq!(metadata.fields["id"].value_type, ValueType::String);
    assert_eq!(metadata.fields["amount"].value_type, ValueType::Float);
    assert_eq!(metadata.fields["flag"].value_type, ValueType::Other);
    assert_eq!(metadata.fields["extra"].value_type, ValueType::Float);
}

#[test]
fn test_parse_sample_response() {
    let inferrer = SampleInferrer::new();
    let body = json!({"data": [{"id": 1, "name": "x"}]});
    let metadata = parse_sample_response("items", &body, "data", &inferrer).unwrap();
    assert_eq!(metadata.fields.len(), 2);

    let empty = json!({"data": []});
    let metadata = parse_sample_response("items", &empty, "data", &inferrer).unwrap();
    assert!(metadata.fields.is_empty());

    let wrong = json!({"data": {"id": 1}});
    let err = parse_sample_response("items", &wrong, "data", &inferrer).unwrap_err();
    assert!(err.is(ErrorKind::NotArray));
}

// ============================================================================
// GraphQL introspection
// ============================================================================

#[test]
fn test_parse_type_introspection() {
    let body = json!({"data": {"__type": {"name": "Issue", "fields": [
        {"name": "id", "type": {"name": null, "kind": "NON_NULL", "ofType": {"name": "ID", "kind": "SCALAR"}}},
        {"name": "estimate", "type": {"name": "Float", "kind": "SCALAR", "ofType": null}},
        {"name": "title", "type": {"name": "String", "kind": "SCALAR", "ofType": null}},
        {"name": "archived", "type": {"name": "Boolean", "kind": "SCALAR", "ofType": null}},
        {"name": "team", "type": {"name": "Team", "kind": "OBJECT", "ofType": null}}
    ]}}});

    let metadata = parse_type_introspection("issues", &body).unwrap();
    assert_eq!(metadata.display_name, "Issue");
    assert_eq!(metadata.fields["id"].value_type, ValueType::String);
    assert_eq!(metadata.fields["id"].provider_type, "ID");
    assert_eq!(metadata.fields["id"].required, Some(true));
    assert_eq!(metadata.fields["estimate"].value_type, ValueType::Float);
    assert_eq!(metadata.fields["title"].value_type, ValueType::String);
    assert_eq!(metadata.fields["archived"].value_type, ValueType::Boolean);
    assert_eq!(metadata.fields["team"].value_type, ValueType::Other);
    assert_eq!(metadata.fields["title"].required, None);
}

#[test]
fn test_parse_type_introspection_unknown_type() {
    let body = json!({"data": {"__type": null}});
    let err = parse_type_introspection("butterflies", &body).unwrap_err();
    assert!(err.is(ErrorKind::ObjectNotFound));
}

// ============================================================================
// Resolver scheduling
// ============================================================================

async fn fake_fetch(name: String) -> crate::Result<ObjectMetadata> {
    if name == "broken" {
        Err(Error::from_status(500))
    } else {
        Ok(ObjectMetadata::new(name.to_uppercase()))
    }
}

#[tokio::test]
async fn test_resolve_serial_records_failures() {
    let result = resolve_objects(&names(&["a", "broken", "b"]), FetchMode::Serial, 1, fake_fetch).await;
    assert_eq!(result.result.len(), 2);
    assert_eq!(result.result["a"].display_name, "A");
    assert_eq!(result.error_kind("broken"), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_resolve_parallel_independent_failures() {
    let list = names(&["a", "b", "broken", "c", "d", "e"]);
    let result = resolve_objects(&list, FetchMode::Parallel, DEFAULT_CONCURRENCY, fake_fetch).await;

    assert_eq!(result.result.len(), 5);
    assert_eq!(result.errors.len(), 1);
    for name in &list {
        assert!(result.result.contains_key(name) ^ result.errors.contains_key(name));
    }
}
