//! Endpoint registry
//!
//! Each module declares which objects support read, write, delete and
//! subscribe through brace-comma patterns:
//!
//! ```yaml
//! endpoints:
//!   - endpoint: "{calls,users,workspaces}"
//!     support: [read]
//!   - endpoint: "{calls}"
//!     support: [write]
//! ```
//!
//! An object supports a capability iff some pattern granting it matches.

mod pattern;
mod registry;

pub use pattern::EndpointPattern;
pub use registry::{EndpointRegistry, EndpointRegistryInput, EndpointSupport};

#[cfg(test)]
mod tests;
