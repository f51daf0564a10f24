//! Per-module capability registry

use super::pattern::EndpointPattern;
use crate::error::Result;
use crate::types::{normalize_object_name, AliasTable, Capability, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One declared endpoint pattern and the capabilities it grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSupport {
    pub endpoint: String,
    pub support: Vec<Capability>,
}

impl EndpointSupport {
    /// Create a support entry
    pub fn new(endpoint: impl Into<String>, support: &[Capability]) -> Self {
        Self {
            endpoint: endpoint.into(),
            support: support.to_vec(),
        }
    }
}

/// Declared endpoints per module
pub type EndpointRegistryInput = BTreeMap<ModuleId, Vec<EndpointSupport>>;

#[derive(Debug, Clone)]
struct Entry {
    pattern: EndpointPattern,
    support: BTreeSet<Capability>,
}

/// Answers "does module M support capability C for object O"
///
/// Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    modules: HashMap<ModuleId, Vec<Entry>>,
    aliases: HashMap<ModuleId, AliasTable>,
}

impl EndpointRegistry {
    /// Compile every pattern; an invalid pattern fails the whole registry
    pub fn new(input: &EndpointRegistryInput) -> Result<Self> {
        let mut modules = HashMap::new();
        for (module, endpoints) in input {
            let entries = endpoints
                .iter()
                .map(|e| {
                    Ok(Entry {
                        pattern: EndpointPattern::compile(&e.endpoint)?,
                        support: e.support.iter().copied().collect(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            modules.insert(module.clone(), entries);
        }
        Ok(Self {
            modules,
            aliases: HashMap::new(),
        })
    }

    /// Attach an alias table used by [`resolve_endpoint`](Self::resolve_endpoint)
    #[must_use]
    pub fn with_aliases(mut self, module: ModuleId, aliases: AliasTable) -> Self {
        self.aliases.insert(module, aliases);
        self
    }

    /// Check whether a module declares a capability for an object
    pub fn is_supported(&self, module: &ModuleId, object: &str, capability: Capability) -> bool {
        let object = normalize_object_name(object);
        self.modules.get(module).is_some_and(|entries| {
            entries
                .iter()
                .any(|e| e.support.contains(&capability) && e.pattern.matches(&object))
        })
    }

    /// Capabilities a module declares for an object
    pub fn capabilities(&self, module: &ModuleId, object: &str) -> BTreeSet<Capability> {
        let object = normalize_object_name(object);
        self.modules
            .get(module)
            .into_iter()
            .flatten()
            .filter(|e| e.pattern.matches(&object))
            .flat_map(|e| e.support.iter().copied())
            .collect()
    }

    /// URL path segment for an object (alias, or the name itself)
    pub fn resolve_endpoint(&self, module: &ModuleId, object: &str) -> String {
        let object = normalize_object_name(object);
        match self.aliases.get(module) {
            Some(aliases) => aliases.get(&object).to_string(),
            None => object,
        }
    }

    /// Objects listed for a capability, expanded from brace groups
    ///
    /// Wildcard patterns cannot be enumerated and are skipped.
    pub fn objects(&self, module: &ModuleId, capability: Capability) -> BTreeSet<String> {
        self.modules
            .get(module)
            .into_iter()
            .flatten()
            .filter(|e| e.support.contains(&capability))
            .filter_map(|e| e.pattern.expand())
            .flatten()
            .collect()
    }

    /// Check whether a module is registered
    pub fn has_module(&self, module: &ModuleId) -> bool {
        self.modules.contains_key(module)
    }

    /// Registered modules
    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }
}
