//! Object metadata
//!
//! Resolves per-object field metadata from one of three sources:
//!
//! - **Static schemas**: embedded JSON documents, see [`StaticSchemas`]
//! - **GraphQL introspection**: one `__type` query per object
//! - **Sample records**: the first record of a `limit=1` list call
//!
//! All three produce the same [`ObjectMetadata`] shape, and multi-object
//! requests report failures per object in a [`ListObjectMetadataResult`].

mod inference;
mod introspection;
mod registry;
mod types;

pub use inference::{infer_metadata, SampleInferrer};
pub use introspection::{
    parse_sample_response, parse_type_introspection, resolve_objects, type_query_variables,
    FetchMode, DEFAULT_CONCURRENCY, TYPE_INTROSPECTION_QUERY,
};
pub use registry::{ModuleSchemas, ObjectSchema, StaticSchemas};
pub use types::{FieldMetadata, ListObjectMetadataResult, ObjectMetadata, ValueType};

#[cfg(test)]
mod tests;
