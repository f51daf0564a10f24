//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy Connect CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-connect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Provider: built-in name or definition file (YAML)
    #[arg(short, long, global = true)]
    pub provider: Option<PathBuf>,

    /// Module of the provider to use
    #[arg(short, long, global = true, default_value = "root")]
    pub module: String,

    /// Credentials file (JSON object of strings)
    #[arg(short = 'C', long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Inline credentials JSON
    #[arg(long, global = true)]
    pub credentials_json: Option<String>,

    /// Connector metadata used in URL templates (key=value, repeatable)
    #[arg(long = "meta", global = true, value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List built-in providers
    Providers,

    /// Validate a provider definition
    Validate,

    /// List objects and their capabilities
    Objects,

    /// Describe objects
    Metadata {
        /// Object names (comma-separated)
        #[arg(long)]
        objects: String,
    },

    /// Read records of an object
    Read {
        #[arg(long)]
        object: String,

        /// Fields to return (`*` or comma-separated)
        #[arg(long, default_value = "*")]
        fields: String,

        /// Only records updated at or after this instant (RFC 3339)
        #[arg(long)]
        since: Option<String>,

        /// Only records updated at or before this instant (RFC 3339)
        #[arg(long)]
        until: Option<String>,

        #[arg(long)]
        page_size: Option<usize>,

        /// Resume from a page token
        #[arg(long)]
        next_page: Option<String>,

        /// Provider filter expression
        #[arg(long)]
        filter: Option<String>,

        /// Associated objects to include (comma-separated)
        #[arg(long)]
        associations: Option<String>,

        /// Pages to read before stopping
        #[arg(long, default_value = "1")]
        max_pages: usize,
    },

    /// Create or update a record
    Write {
        #[arg(long)]
        object: String,

        /// Record to update; omit to create
        #[arg(long)]
        id: Option<String>,

        /// Record data (JSON object)
        #[arg(long)]
        data: String,
    },

    /// Delete a record
    Delete {
        #[arg(long)]
        object: String,

        #[arg(long)]
        id: String,
    },

    /// Fetch records by id
    Lookup {
        #[arg(long)]
        object: String,

        /// Record ids (comma-separated)
        #[arg(long)]
        ids: String,

        #[arg(long, default_value = "*")]
        fields: String,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read() {
        let cli = Cli::try_parse_from([
            "solidafy-connect",
            "-p",
            "gong",
            "--meta",
            "workspace=acme",
            "read",
            "--object",
            "calls",
            "--since",
            "2024-11-01T00:00:00Z",
        ])
        .unwrap();
        assert_eq!(cli.metadata, vec![("workspace".to_string(), "acme".to_string())]);
        match cli.command {
            Commands::Read {
                object,
                fields,
                max_pages,
                ..
            } => {
                assert_eq!(object, "calls");
                assert_eq!(fields, "*");
                assert_eq!(max_pages, 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_key_value_rejects_bare_words() {
        assert!(parse_key_value("workspace").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
