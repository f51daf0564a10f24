//! CLI module
//!
//! Command-line harness over a [`Connector`](crate::connector::Connector).
//!
//! # Commands
//!
//! - `providers` - List built-in providers
//! - `validate` - Validate a provider definition
//! - `objects` - List objects and capabilities
//! - `metadata` - Describe objects
//! - `read` - Read pages of an object
//! - `write` / `delete` - Change records
//! - `lookup` - Fetch records by id

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
