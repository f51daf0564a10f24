//! Provider packages
//!
//! A provider is described by a YAML [`ProviderDefinition`]:
//!
//! ```yaml
//! name: gong
//! base_url: https://api.gong.io
//! auth:
//!   type: basic
//! modules:
//!   root:
//!     path: v2
//!     endpoints:
//!       - endpoint: "{calls,users}"
//!         support: [read]
//!     defaults:
//!       pagination:
//!         type: cursor
//!         cursor_param: { in: query, name: cursor }
//!         cursor_path: records.cursor
//! ```
//!
//! Each module is served by a [`ProviderHandlers`] implementation:
//! [`DeclarativeHandlers`] for REST modules and [`GraphQLHandlers`] for
//! GraphQL ones. Code-defined providers implement the trait directly.

mod declarative;
mod graphql;
mod handlers;
mod registry;
mod types;

pub use declarative::DeclarativeHandlers;
pub use graphql::{GraphQLHandlers, PaginationParameter};
pub use handlers::{
    apply_window_and_cursor, error_messages, extract_records, ProviderHandlers, RequestContext,
};
pub use registry::{
    builtin_schemas, endpoint_registry, get_builtin, list_builtin, load_provider,
    load_provider_from_str, validate_provider, BuiltinProvider,
};
pub use types::{
    AuthStyle, BatchDefinition, ByIdsDefinition, GraphqlObjectDefinition, MetadataDefinition,
    MetadataSource, ModuleDefinition, ModuleKind, ObjectDefinition, PostAuthDefinition,
    ProviderDefinition,
};

use crate::http::FormatSwitch;
use std::sync::Arc;

/// Handlers for a module, chosen by its kind
pub fn module_handlers(module: &ModuleDefinition, errors: FormatSwitch) -> Arc<dyn ProviderHandlers> {
    match module.kind {
        ModuleKind::Rest => Arc::new(DeclarativeHandlers::new(module.clone(), errors)),
        ModuleKind::Graphql => Arc::new(GraphQLHandlers::new(module.clone(), errors)),
    }
}
