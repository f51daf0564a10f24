//! Provider definition types
//!
//! Declarative provider packages, parsed from YAML.

use crate::auth::{AuthConfig, JwtAlgorithm, Location};
use crate::bulk::BulkDefinition;
use crate::endpoints::EndpointSupport;
use crate::error::{Error, Result};
use crate::http::{ErrorTemplateDefinition, ParamLocation, RateLimiterConfig};
use crate::incremental::IncrementalFilter;
use crate::pagination::{PageSizePolicy, PaginationDefinition};
use crate::schema::FetchMode;
use crate::subscription::WebhookDefinition;
use crate::types::{AliasTable, Method, ModuleId, StringMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Provider Definition
// ============================================================================

/// Top-level provider definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderDefinition {
    /// Provider name
    pub name: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Base URL; may reference connector metadata (`https://{workspace}.example.com`)
    pub base_url: String,
    /// Authentication style
    #[serde(default)]
    pub auth: AuthStyle,
    /// Encoded → literal replacements applied to query strings
    #[serde(default)]
    pub encoding_exceptions: BTreeMap<String, String>,
    #[serde(default)]
    pub page_size: PageSizePolicy,
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Error format switch, tried in order
    #[serde(default)]
    pub error_format: Vec<ErrorTemplateDefinition>,
    /// Discovery call made once after authentication
    #[serde(default)]
    pub post_auth: Option<PostAuthDefinition>,
    /// Sub-APIs by id
    pub modules: BTreeMap<ModuleId, ModuleDefinition>,
}

impl ProviderDefinition {
    /// Name to show users
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Look up a module
    pub fn module(&self, id: &ModuleId) -> Result<&ModuleDefinition> {
        self.modules.get(id).ok_or_else(|| {
            Error::config(format!(
                "provider '{}' has no module '{id}'",
                self.name
            ))
        })
    }
}

// ============================================================================
// Auth Style
// ============================================================================

/// How a provider expects credentials
///
/// Secrets are not part of the definition; [`AuthStyle::credentials`] pairs
/// the style with externally loaded values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthStyle {
    #[default]
    None,
    ApiKey {
        #[serde(default)]
        location: Location,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },
    Basic,
    Bearer,
    Oauth2 {
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
    /// Service-account assertion signed with a private key
    Jwt {
        audience: String,
        #[serde(default)]
        algorithm: JwtAlgorithm,
        #[serde(default)]
        token_url: Option<String>,
    },
    CustomHeaders {
        /// Header names; values come from credentials of the same name
        headers: Vec<String>,
    },
}

impl AuthStyle {
    /// Build an auth configuration from named credentials
    ///
    /// Keys: `api_key`, `username`, `password`, `token`, `client_id`,
    /// `client_secret`, `refresh_token`, `access_token`, `issuer`, `subject`,
    /// `private_key`, or a header name for custom headers. OAuth2 uses
    /// refresh when a refresh token is present and client credentials
    /// otherwise.
    pub fn credentials(&self, creds: &StringMap) -> Result<AuthConfig> {
        let get = |key: &str| {
            creds
                .get(key)
                .cloned()
                .ok_or_else(|| Error::missing_field(key))
        };
        let config = match self {
            Self::None => AuthConfig::None,
            Self::ApiKey {
                location,
                name,
                prefix,
            } => AuthConfig::ApiKey {
                location: *location,
                name: name.clone(),
                prefix: prefix.clone(),
                value: get("api_key")?,
            },
            Self::Basic => AuthConfig::Basic {
                username: get("username")?,
                password: creds.get("password").cloned().unwrap_or_default(),
            },
            Self::Bearer => AuthConfig::Bearer {
                token: get("token")?,
            },
            Self::Oauth2 { token_url, scopes } => match creds.get("refresh_token") {
                Some(refresh_token) => AuthConfig::Oauth2Refresh {
                    token_url: token_url.clone(),
                    client_id: get("client_id")?,
                    client_secret: get("client_secret")?,
                    refresh_token: refresh_token.clone(),
                    access_token: creds.get("access_token").cloned(),
                    expires_at: None,
                },
                None => AuthConfig::Oauth2ClientCredentials {
                    token_url: token_url.clone(),
                    client_id: get("client_id")?,
                    client_secret: get("client_secret")?,
                    scopes: scopes.clone(),
                    token_body: Default::default(),
                },
            },
            Self::Jwt {
                audience,
                algorithm,
                token_url,
            } => AuthConfig::Jwt {
                issuer: get("issuer")?,
                subject: creds.get("subject").cloned(),
                audience: audience.clone(),
                private_key: get("private_key")?,
                algorithm: *algorithm,
                token_lifetime_seconds: 3600,
                claims: Default::default(),
                token_url: token_url.clone(),
            },
            Self::CustomHeaders { headers } => AuthConfig::CustomHeaders {
                headers: headers
                    .iter()
                    .map(|h| Ok((h.clone(), get(h)?)))
                    .collect::<Result<_>>()?,
            },
        };
        Ok(config)
    }
}

// ============================================================================
// Post-auth Discovery
// ============================================================================

/// Discovery call whose reply supplies template variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuthDefinition {
    /// Path or absolute URL
    pub path: String,
    #[serde(default)]
    pub method: Method,
    /// Variable name → JSON path in the reply
    pub vars: BTreeMap<String, String>,
}

// ============================================================================
// Module Definition
// ============================================================================

/// API style of a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    #[default]
    Rest,
    Graphql,
}

/// One sub-API of a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModuleDefinition {
    #[serde(default)]
    pub kind: ModuleKind,
    /// Path prefix under the base URL (the endpoint itself for GraphQL)
    #[serde(default)]
    pub path: String,
    /// Declared endpoint patterns and their capabilities
    pub endpoints: Vec<EndpointSupport>,
    /// Object name → provider key
    #[serde(default)]
    pub aliases: AliasTable,
    /// Settings shared by every object
    #[serde(default)]
    pub defaults: ObjectDefinition,
    /// Per-object overrides
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectDefinition>,
    #[serde(default)]
    pub metadata: MetadataDefinition,
    #[serde(default)]
    pub bulk: Option<BulkDefinition>,
    #[serde(default)]
    pub webhooks: Option<WebhookDefinition>,
}

impl ModuleDefinition {
    /// Settings for an object, falling back to the module defaults
    pub fn object(&self, name: &str) -> ObjectDefinition {
        match self.objects.get(name) {
            Some(def) => def.clone().or(&self.defaults),
            None => self.defaults.clone(),
        }
    }
}

// ============================================================================
// Object Definition
// ============================================================================

/// How one object is read, written and deleted
///
/// Every field is optional; unset fields fall back to the module defaults
/// and then to built-in conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectDefinition {
    /// Collection path relative to the module
    pub path: Option<String>,
    /// Single-record path; `{id}` is the record id
    pub record_path: Option<String>,
    /// Where list responses carry the records; `$`-prefixed paths are JSONPath
    pub records_path: Option<String>,
    /// Key wrapping a single record in responses and write bodies
    pub record_key: Option<String>,
    /// Id within a record
    pub id_path: Option<String>,
    /// Id within a write response, when it differs from the record id path
    pub write_id_path: Option<String>,
    pub pagination: Option<PaginationDefinition>,
    pub incremental: Option<IncrementalFilter>,
    /// Method for updates; creates always POST
    pub update_method: Option<Method>,
    /// Static query parameters for reads
    pub query: Option<BTreeMap<String, String>>,
    /// Where `ReadParams::filter` is sent
    pub filter_param: Option<ParamLocation>,
    /// Where associated object names are sent, comma-joined
    pub associations_param: Option<ParamLocation>,
    pub batch: Option<BatchDefinition>,
    pub by_ids: Option<ByIdsDefinition>,
    /// GraphQL settings
    pub graphql: Option<GraphqlObjectDefinition>,
}

impl ObjectDefinition {
    /// Fill unset fields from `defaults`
    #[must_use]
    pub fn or(self, defaults: &ObjectDefinition) -> Self {
        let d = defaults.clone();
        Self {
            path: self.path.or(d.path),
            record_path: self.record_path.or(d.record_path),
            records_path: self.records_path.or(d.records_path),
            record_key: self.record_key.or(d.record_key),
            id_path: self.id_path.or(d.id_path),
            write_id_path: self.write_id_path.or(d.write_id_path),
            pagination: self.pagination.or(d.pagination),
            incremental: self.incremental.or(d.incremental),
            update_method: self.update_method.or(d.update_method),
            query: self.query.or(d.query),
            filter_param: self.filter_param.or(d.filter_param),
            associations_param: self.associations_param.or(d.associations_param),
            batch: self.batch.or(d.batch),
            by_ids: self.by_ids.or(d.by_ids),
            graphql: match (self.graphql, d.graphql) {
                (Some(own), Some(base)) => Some(own.or(&base)),
                (own, base) => own.or(base),
            },
        }
    }

    /// Id path, `id` by default
    pub fn id_path(&self) -> &str {
        self.id_path.as_deref().unwrap_or("id")
    }

    /// Pagination, none by default
    pub fn pagination(&self) -> PaginationDefinition {
        self.pagination.clone().unwrap_or_default()
    }

    /// Update method, PATCH by default
    pub fn update_method(&self) -> Method {
        self.update_method.unwrap_or(Method::PATCH)
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_results_path() -> String {
    "results".to_string()
}

fn default_error_path() -> String {
    "error".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Batch write endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDefinition {
    pub path: String,
    /// Records per request
    #[serde(default = "default_batch_size")]
    pub max_size: usize,
    /// Key wrapping the records array in the body; bare array when unset
    #[serde(default)]
    pub records_key: Option<String>,
    /// Field carrying the record id of updates
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Per-record results, in request order
    #[serde(default = "default_results_path")]
    pub results_path: String,
    /// Per-result error message
    #[serde(default = "default_error_path")]
    pub error_path: String,
}

fn default_ids_param() -> ParamLocation {
    ParamLocation::query("ids")
}

/// Batch-by-ids read endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByIdsDefinition {
    pub path: String,
    /// Where the ids go: comma-joined in a query, an array elsewhere
    #[serde(default = "default_ids_param")]
    pub ids_param: ParamLocation,
    #[serde(default)]
    pub method: Method,
    /// Where the records are; defaults to the object's records path
    #[serde(default)]
    pub records_path: Option<String>,
}

/// GraphQL naming for one object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlObjectDefinition {
    /// Schema type, used for introspection (`Issue`)
    pub type_name: Option<String>,
    /// Root query field for lists (`issues`)
    pub query_field: Option<String>,
    /// Root query field for one record (`issue`)
    pub record_field: Option<String>,
    /// Full list query, replacing the generated one
    pub query: Option<String>,
    /// Fields selected when the caller asks for all
    pub default_fields: Option<Vec<String>>,
    pub create_mutation: Option<String>,
    pub update_mutation: Option<String>,
    pub delete_mutation: Option<String>,
    /// Input types; `<Type>CreateInput` / `<Type>UpdateInput` by default
    pub create_input: Option<String>,
    pub update_input: Option<String>,
    /// Filter variable type; `<Type>Filter` by default
    pub filter_type: Option<String>,
    /// Whether mutations report `userErrors`
    pub user_errors: Option<bool>,
}

impl GraphqlObjectDefinition {
    /// Fill unset fields from `defaults`
    #[must_use]
    pub fn or(self, defaults: &GraphqlObjectDefinition) -> Self {
        let d = defaults.clone();
        Self {
            type_name: self.type_name.or(d.type_name),
            query_field: self.query_field.or(d.query_field),
            record_field: self.record_field.or(d.record_field),
            query: self.query.or(d.query),
            default_fields: self.default_fields.or(d.default_fields),
            create_mutation: self.create_mutation.or(d.create_mutation),
            update_mutation: self.update_mutation.or(d.update_mutation),
            delete_mutation: self.delete_mutation.or(d.delete_mutation),
            create_input: self.create_input.or(d.create_input),
            update_input: self.update_input.or(d.update_input),
            filter_type: self.filter_type.or(d.filter_type),
            user_errors: self.user_errors.or(d.user_errors),
        }
    }
}

// ============================================================================
// Metadata Definition
// ============================================================================

/// Where live metadata comes from when no static schema covers a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// Embedded schemas only
    #[default]
    Static,
    /// GraphQL `__type` queries
    Introspection,
    /// First record of a list call
    Sample,
}

fn default_concurrency() -> usize {
    crate::schema::DEFAULT_CONCURRENCY
}

/// Metadata resolution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDefinition {
    #[serde(default)]
    pub source: MetadataSource,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Sample inference: classify ISO 8601 strings as dates
    #[serde(default)]
    pub detect_datetime: bool,
}

impl Default for MetadataDefinition {
    fn default() -> Self {
        Self {
            source: MetadataSource::default(),
            fetch_mode: FetchMode::default(),
            concurrency: default_concurrency(),
            detect_datetime: false,
        }
    }
}
