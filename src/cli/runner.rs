//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::connector::{Connector, ConnectorBuilder, DeleteParams, Fields, ReadParams, WriteParams};
use crate::error::{Error, Result, ResultExt};
use crate::provider::{get_builtin, list_builtin, load_provider, ProviderDefinition};
use crate::types::{Capability, StringMap};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Providers => self.list_providers(),
            Commands::Validate => self.validate(),
            Commands::Objects => self.objects(),
            Commands::Metadata { objects } => self.metadata(objects).await,
            Commands::Read {
                object,
                fields,
                since,
                until,
                page_size,
                next_page,
                filter,
                associations,
                max_pages,
            } => {
                let mut params = ReadParams::new(object, Fields::parse(fields));
                params.since = since.as_deref().map(parse_instant).transpose()?;
                params.until = until.as_deref().map(parse_instant).transpose()?;
                params.page_size = *page_size;
                params.next_page.clone_from(next_page);
                params.filter.clone_from(filter);
                params.associated_objects = split_list(associations.as_deref().unwrap_or(""));
                self.read(params, *max_pages).await
            }
            Commands::Write { object, id, data } => self.write(object, id.as_deref(), data).await,
            Commands::Delete { object, id } => self.delete(object, id).await,
            Commands::Lookup {
                object,
                ids,
                fields,
            } => self.lookup(object, ids, fields).await,
        }
    }

    /// Load the provider definition
    fn load_provider(&self) -> Result<ProviderDefinition> {
        let path = self
            .cli
            .provider
            .as_ref()
            .ok_or_else(|| Error::config("Provider not specified (use -p flag)"))?;
        load_provider(path)
    }

    /// Load credentials
    fn load_credentials(&self) -> Result<StringMap> {
        // Inline credentials take precedence
        let content = if let Some(json_str) = &self.cli.credentials_json {
            json_str.clone()
        } else if let Some(path) = &self.cli.credentials {
            fs::read_to_string(path).with_context(|| {
                format!("Failed to read credentials file '{}'", path.display())
            })?
        } else {
            return Ok(StringMap::new());
        };

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Invalid credentials JSON: {e}")))?;
        let Value::Object(map) = value else {
            return Err(Error::config("Credentials must be a JSON object"));
        };
        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }

    /// Build a connector from the global flags
    fn connector(&self) -> Result<Connector> {
        let name = self
            .cli
            .provider
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .ok_or_else(|| Error::config("Provider not specified (use -p flag)"))?;

        let mut builder = if get_builtin(&name).is_some() {
            ConnectorBuilder::from_builtin(&name)?
        } else {
            ConnectorBuilder::new(self.load_provider()?)
        };
        builder = builder.module(self.cli.module.clone());

        let credentials = self.load_credentials()?;
        if !credentials.is_empty() {
            builder = builder.credentials(&credentials)?;
        }
        for (key, value) in &self.cli.metadata {
            builder = builder.metadata(key.clone(), value.clone());
        }
        if let Some(secs) = self.cli.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// List built-in providers
    fn list_providers(&self) -> Result<()> {
        let providers: Vec<Value> = list_builtin()
            .into_iter()
            .filter_map(get_builtin)
            .map(|p| {
                json!({
                    "name": p.name,
                    "description": p.description,
                    "static_schemas": p.schemas.is_some(),
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "PROVIDERS",
            "providers": providers
        }));
        Ok(())
    }

    /// Validate provider definition
    fn validate(&self) -> Result<()> {
        let provider = self.load_provider()?;
        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Provider '{}' is valid with {} module(s)",
                    provider.title(),
                    provider.modules.len()
                )
            }
        }));
        Ok(())
    }

    /// List objects with their capabilities
    fn objects(&self) -> Result<()> {
        let connector = self.connector()?;
        let mut names = std::collections::BTreeSet::new();
        for capability in [
            Capability::Read,
            Capability::Write,
            Capability::Delete,
            Capability::Subscribe,
            Capability::Metadata,
        ] {
            names.extend(connector.objects(capability));
        }
        let objects: Vec<Value> = names
            .iter()
            .map(|name| {
                let caps: Vec<String> = connector
                    .capabilities(name)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                json!({"name": name, "capabilities": caps})
            })
            .collect();

        self.output_message(&json!({
            "type": "OBJECTS",
            "provider": connector.provider().name,
            "module": connector.module_id().as_str(),
            "objects": objects
        }));
        Ok(())
    }

    async fn metadata(&self, objects: &str) -> Result<()> {
        let connector = self.connector()?;
        let names = split_list(objects);
        let out = connector.list_object_metadata(&names).await?;
        info!(
            resolved = out.result.len(),
            failed = out.errors.len(),
            "Metadata resolved"
        );
        self.output_message(&json!({"type": "METADATA", "metadata": out.to_json()}));
        Ok(())
    }

    async fn read(&self, mut params: ReadParams, max_pages: usize) -> Result<()> {
        let connector = self.connector()?;
        let mut total = 0;
        for _ in 0..max_pages.max(1) {
            let page = connector.read(&params).await?;
            total += page.rows;
            self.output_message(&json!({"type": "PAGE", "page": page}));
            if page.done {
                break;
            }
            params.next_page = Some(page.next_page);
        }
        info!(object = %params.object_name, records = total, "Read complete");
        Ok(())
    }

    async fn write(&self, object: &str, id: Option<&str>, data: &str) -> Result<()> {
        let connector = self.connector()?;
        let record_data: Value = serde_json::from_str(data)
            .map_err(|e| Error::config(format!("Invalid record JSON: {e}")))?;
        let params = match id {
            Some(id) => WriteParams::update(object, id, record_data),
            None => WriteParams::create(object, record_data),
        };
        let result = connector.write(&params).await?;
        self.output_message(&json!({"type": "WRITE", "result": result}));
        Ok(())
    }

    async fn delete(&self, object: &str, id: &str) -> Result<()> {
        let connector = self.connector()?;
        let result = connector.delete(&DeleteParams::new(object, id)).await?;
        self.output_message(&json!({"type": "DELETE", "result": result}));
        Ok(())
    }

    async fn lookup(&self, object: &str, ids: &str, fields: &str) -> Result<()> {
        let connector = self.connector()?;
        let ids = split_list(ids);
        let out = connector
            .get_records_by_ids(object, &ids, &Fields::parse(fields))
            .await?;
        self.output_message(&json!({"type": "RECORDS", "records": out.to_json()}));
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::config(format!("Invalid timestamp '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" calls, ,users "), vec!["calls", "users"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_parse_instant_normalizes_to_utc() {
        let instant = parse_instant("2024-10-31T16:00:00-08:00").unwrap();
        assert_eq!(instant.to_rfc3339(), "2024-11-01T00:00:00+00:00");
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn test_inline_credentials() {
        let cli = Cli::try_parse_from([
            "solidafy-connect",
            "-p",
            "gong",
            "--credentials-json",
            r#"{"username": "key", "password": "secret", "port": 8080}"#,
            "objects",
        ])
        .unwrap();
        let creds = Runner::new(cli).load_credentials().unwrap();
        assert_eq!(creds["username"], "key");
        assert_eq!(creds["port"], "8080");
    }

    #[test]
    fn test_builtin_connector_from_flags() {
        let cli = Cli::try_parse_from([
            "solidafy-connect",
            "-p",
            "gong",
            "--credentials-json",
            r#"{"username": "key", "password": "secret"}"#,
            "objects",
        ])
        .unwrap();
        let connector = Runner::new(cli).connector().unwrap();
        assert_eq!(connector.provider().name, "gong");
        assert!(connector.objects(Capability::Read).contains("calls"));
    }

    #[test]
    fn test_missing_provider_flag() {
        let cli = Cli::try_parse_from(["solidafy-connect", "objects"]).unwrap();
        let err = Runner::new(cli).connector().unwrap_err();
        assert!(err.to_string().contains("-p"));
    }
}
