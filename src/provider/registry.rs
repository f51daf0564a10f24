//! Built-in providers and the definition loader
//!
//! Supports both built-in providers (by name) and custom YAML files (by
//! path). Built-in packages are embedded at compile time together with their
//! static schemas.

use super::types::{MetadataSource, ModuleKind, ProviderDefinition};
use crate::endpoints::{EndpointPattern, EndpointRegistry, EndpointRegistryInput};
use crate::error::{Error, Result};
use crate::schema::StaticSchemas;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// An embedded provider package
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProvider {
    pub name: &'static str,
    pub description: &'static str,
    pub yaml: &'static str,
    pub schemas: Option<&'static str>,
}

static BUILTIN_PROVIDERS: LazyLock<HashMap<&'static str, BuiltinProvider>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();

        m.insert(
            "gong",
            BuiltinProvider {
                name: "gong",
                description: "Gong calls, users and workspaces",
                yaml: include_str!("../../providers/gong.yaml"),
                schemas: Some(include_str!("../../providers/gong.schemas.json")),
            },
        );
        m.insert(
            "linear",
            BuiltinProvider {
                name: "linear",
                description: "Linear issues, projects, teams, users and comments",
                yaml: include_str!("../../providers/linear.yaml"),
                schemas: None,
            },
        );

        m
    });

/// Get a built-in provider by name
pub fn get_builtin(name: &str) -> Option<&'static BuiltinProvider> {
    BUILTIN_PROVIDERS.get(name)
}

/// Built-in provider names, sorted
pub fn list_builtin() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_PROVIDERS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Embedded static schemas of a built-in provider
pub fn builtin_schemas(name: &str) -> Result<Option<StaticSchemas>> {
    match get_builtin(name).and_then(|p| p.schemas) {
        Some(json) => StaticSchemas::from_json(json).map(Some),
        None => Ok(None),
    }
}

/// Load a provider definition from a built-in name or a file path
///
/// ```ignore
/// let gong = load_provider("gong")?;
/// let custom = load_provider("./providers/acme.yaml")?;
/// ```
pub fn load_provider(path: impl AsRef<Path>) -> Result<ProviderDefinition> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(builtin) = get_builtin(&path_str) {
            return load_provider_from_str(builtin.yaml);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config(format!(
                "Provider '{}' not found. Built-in providers: {}. Or provide a path to a YAML file.",
                path.display(),
                list_builtin().join(", ")
            ))
        } else {
            Error::config(format!(
                "Failed to read provider file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_provider_from_str(&content)
}

/// Load a provider definition from a YAML string
pub fn load_provider_from_str(yaml: &str) -> Result<ProviderDefinition> {
    let def: ProviderDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse provider YAML: {e}")))?;

    validate_provider(&def)?;
    Ok(def)
}

/// Endpoint registry over every module of a provider
pub fn endpoint_registry(def: &ProviderDefinition) -> Result<EndpointRegistry> {
    let input: EndpointRegistryInput = def
        .modules
        .iter()
        .map(|(id, module)| (id.clone(), module.endpoints.clone()))
        .collect();
    let registry = def
        .modules
        .iter()
        .fold(EndpointRegistry::new(&input)?, |registry, (id, module)| {
            registry.with_aliases(id.clone(), module.aliases.clone())
        });
    Ok(registry)
}

/// Validate a provider definition
pub fn validate_provider(def: &ProviderDefinition) -> Result<()> {
    if def.name.is_empty() {
        return Err(Error::config("Provider name cannot be empty"));
    }
    if def.base_url.is_empty() {
        return Err(Error::config("Provider base_url cannot be empty"));
    }
    if def.modules.is_empty() {
        return Err(Error::config("Provider must have at least one module"));
    }
    if let Some(max) = def.page_size.max {
        if def.page_size.default > max {
            return Err(Error::config(format!(
                "Default page size {} exceeds the maximum {max}",
                def.page_size.default
            )));
        }
    }

    for (id, module) in &def.modules {
        if module.endpoints.is_empty() {
            return Err(Error::config(format!("Module '{id}' declares no endpoints")));
        }
        for support in &module.endpoints {
            EndpointPattern::compile(&support.endpoint)?;
        }
        for name in module.objects.keys() {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::config(format!(
                    "Module '{id}' has an invalid object name '{name}'"
                )));
            }
        }
        if module.metadata.source == MetadataSource::Introspection
            && module.kind != ModuleKind::Graphql
        {
            return Err(Error::config(format!(
                "Module '{id}': introspection metadata requires a graphql module"
            )));
        }
        if module.metadata.concurrency == 0 {
            return Err(Error::config(format!(
                "Module '{id}': metadata concurrency must be at least 1"
            )));
        }
    }

    Ok(())
}
