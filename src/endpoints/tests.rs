//! Tests for the endpoint registry

use super::*;
use crate::error::Error;
use crate::types::{AliasTable, Capability, ModuleId};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use test_case::test_case;

#[test_case("{a,b,c}", "a", true)]
#[test_case("{a,b,c}", "c", true)]
#[test_case("{a,b,c}", "d", false)]
#[test_case("{a,b,c}", "ab", false)]
#[test_case("{a,b,c}", "a,b", false)]
#[test_case("a/b", "a/b", true)]
#[test_case("a/b", "a/bc", false)]
#[test_case("a/b", "a", false)]
#[test_case("crm/{contacts,leads}", "crm/leads", true)]
#[test_case("crm/{contacts,leads}", "contacts", false)]
#[test_case("objects/*", "objects/deals", true)]
#[test_case("objects/*", "objects/deals/x", false)]
#[test_case("a.b", "axb", false)]
fn test_pattern_matching(pattern: &str, object: &str, expected: bool) {
    let compiled = EndpointPattern::compile(pattern).unwrap();
    assert_eq!(compiled.matches(object), expected);
}

#[test_case("" ; "empty")]
#[test_case("{a,b" ; "unclosed")]
#[test_case("a}" ; "unbalanced")]
#[test_case("{a,,b}" ; "empty name")]
#[test_case("{a,{b}}" ; "nested")]
fn test_invalid_patterns(pattern: &str) {
    let err = EndpointPattern::compile(pattern).unwrap_err();
    assert!(matches!(err, Error::InvalidEndpointPattern { .. }));
}

#[test]
fn test_expand() {
    let p = EndpointPattern::compile("{a,b}/{x,y}").unwrap();
    assert_eq!(
        p.expand().unwrap(),
        vec!["a/x", "a/y", "b/x", "b/y"]
    );
    assert!(EndpointPattern::compile("*").unwrap().expand().is_none());
}

fn registry() -> EndpointRegistry {
    let mut input = EndpointRegistryInput::new();
    input.insert(
        ModuleId::root(),
        vec![
            EndpointSupport::new("{calls,users,workspaces}", &[Capability::Read]),
            EndpointSupport::new("{calls}", &[Capability::Write]),
            EndpointSupport::new("{users}", &[Capability::Delete, Capability::Write]),
        ],
    );
    input.insert(
        ModuleId::new("crm"),
        vec![EndpointSupport::new("{people,companies}", &[Capability::Read])],
    );
    EndpointRegistry::new(&input)
        .unwrap()
        .with_aliases(ModuleId::new("crm"), AliasTable::new().with("people", "person"))
}

#[test]
fn test_is_supported() {
    let reg = registry();
    let root = ModuleId::root();
    assert!(reg.is_supported(&root, "calls", Capability::Read));
    assert!(reg.is_supported(&root, "Calls", Capability::Write));
    assert!(!reg.is_supported(&root, "workspaces", Capability::Write));
    assert!(reg.is_supported(&root, "users", Capability::Delete));
    assert!(!reg.is_supported(&ModuleId::new("crm"), "calls", Capability::Read));
    assert!(!reg.is_supported(&ModuleId::new("missing"), "calls", Capability::Read));
}

#[test]
fn test_capabilities_and_objects() {
    let reg = registry();
    let root = ModuleId::root();
    assert_eq!(
        reg.capabilities(&root, "users"),
        BTreeSet::from([Capability::Read, Capability::Write, Capability::Delete])
    );
    assert_eq!(
        reg.objects(&root, Capability::Read),
        BTreeSet::from(["calls".to_string(), "users".to_string(), "workspaces".to_string()])
    );
}

#[test]
fn test_resolve_endpoint() {
    let reg = registry();
    assert_eq!(reg.resolve_endpoint(&ModuleId::new("crm"), "people"), "person");
    assert_eq!(reg.resolve_endpoint(&ModuleId::new("crm"), "companies"), "companies");
    assert_eq!(reg.resolve_endpoint(&ModuleId::root(), "calls"), "calls");
}

#[test]
fn test_invalid_pattern_fails_registry() {
    let mut input = EndpointRegistryInput::new();
    input.insert(
        ModuleId::root(),
        vec![EndpointSupport::new("{calls", &[Capability::Read])],
    );
    assert!(EndpointRegistry::new(&input).is_err());
}
