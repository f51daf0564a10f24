//! Connector core
//!
//! A [`Connector`] binds one provider module to an authenticated client and
//! exposes the capability facade:
//!
//! - [`Connector::read`]: one page per call, resumed with `next_page`
//! - [`Connector::write`]: create when `record_id` is empty, update otherwise
//! - [`Connector::delete`]
//! - [`Connector::list_object_metadata`]: per-object failures are reported,
//!   not raised
//! - [`Connector::batch_write`] and [`Connector::get_records_by_ids`]
//! - [`Connector::bulk`] and [`Connector::subscriber`] for modules that
//!   declare bulk jobs or webhooks
//!
//! Every call validates its parameters and checks the endpoint registry
//! before any request is sent. Post-auth discovery runs on the first call
//! and its outcome is kept for the connector's lifetime.
//!
//! # Example
//!
//! ```ignore
//! let connector = ConnectorBuilder::from_builtin("gong")?
//!     .credentials(&creds)?
//!     .build()?;
//! let page = connector.read(&ReadParams::new("calls", Fields::all())).await?;
//! ```

mod batch;
mod bootstrap;
mod by_ids;
mod delete;
mod metadata;
mod read;
mod types;
mod write;

pub use types::{
    BatchWriteParams, BatchWriteResult, DeleteParams, DeleteResult, Fields, PostAuthInfo,
    ReadParams, ReadResult, ReadResultRow, RecordsByIdsResult, WriteParams, WriteRecord,
    WriteResult,
};

use crate::auth::AuthConfig;
use crate::bulk::BulkClient;
use crate::endpoints::EndpointRegistry;
use crate::error::{Error, Result};
use crate::http::{FormatSwitch, HttpClient, HttpClientConfig};
use crate::provider::{
    builtin_schemas, endpoint_registry, load_provider, module_handlers, validate_provider,
    ModuleDefinition, ProviderDefinition, ProviderHandlers, RequestContext,
};
use crate::schema::{ListObjectMetadataResult, StaticSchemas};
use crate::subscription::{SubscribeParams, SubscribeResult, Subscriber};
use crate::template::{render, render_optional, TemplateContext};
use crate::types::{Capability, ModuleId, StringMap};
use crate::url_builder::UrlBuilder;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

// ============================================================================
// Capability Facade
// ============================================================================

/// Operations every connector offers
///
/// Implemented by [`Connector`]; callers that only move records can depend
/// on this trait instead.
#[async_trait]
pub trait ConnectorApi: Send + Sync {
    /// Provider name
    fn provider_name(&self) -> &str;

    async fn read(&self, params: &ReadParams) -> Result<ReadResult>;

    async fn write(&self, params: &WriteParams) -> Result<WriteResult>;

    async fn delete(&self, params: &DeleteParams) -> Result<DeleteResult>;

    async fn list_object_metadata(&self, objects: &[String]) -> Result<ListObjectMetadataResult>;
}

// ============================================================================
// Session
// ============================================================================

/// State fixed by the first call: discovered variables and the module root
#[derive(Debug, Clone)]
struct Session {
    vars: TemplateContext,
    base_url: String,
    post_auth: Option<PostAuthInfo>,
}

// ============================================================================
// Connector
// ============================================================================

/// A provider module ready to serve calls
pub struct Connector {
    provider: ProviderDefinition,
    module_id: ModuleId,
    module: ModuleDefinition,
    client: HttpClient,
    handlers: Arc<dyn ProviderHandlers>,
    endpoints: EndpointRegistry,
    schemas: Option<StaticSchemas>,
    metadata_vars: TemplateContext,
    /// Bootstrap outcome; failures are kept as their message
    session: OnceCell<std::result::Result<Session, String>>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("provider", &self.provider.name)
            .field("module", &self.module_id)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl Connector {
    /// Start building a connector for a provider definition
    pub fn builder(provider: ProviderDefinition) -> ConnectorBuilder {
        ConnectorBuilder::new(provider)
    }

    /// Provider definition
    pub fn provider(&self) -> &ProviderDefinition {
        &self.provider
    }

    /// Module this connector serves
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Shared HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Capabilities declared for an object
    pub fn capabilities(&self, object: &str) -> BTreeSet<Capability> {
        self.endpoints.capabilities(&self.module_id, object)
    }

    /// Objects supporting a capability, where patterns enumerate them
    pub fn objects(&self, capability: Capability) -> BTreeSet<String> {
        self.endpoints.objects(&self.module_id, capability)
    }

    fn ensure_supported(&self, object: &str, capability: Capability) -> Result<()> {
        if self
            .endpoints
            .is_supported(&self.module_id, object, capability)
        {
            Ok(())
        } else {
            Err(Error::not_supported(object, capability))
        }
    }

    async fn session(&self) -> Result<&Session> {
        let outcome = self
            .session
            .get_or_init(|| async {
                self.start_session().await.map_err(|e| match e {
                    Error::Bootstrap { message } => message,
                    other => other.to_string(),
                })
            })
            .await;
        outcome.as_ref().map_err(|message| Error::Bootstrap {
            message: message.clone(),
        })
    }

    async fn start_session(&self) -> Result<Session> {
        let mut vars = self.metadata_vars.clone();

        let post_auth = match &self.provider.post_auth {
            Some(def) => {
                // The base URL may name variables that discovery supplies
                let provider_url = render_optional(&self.provider.base_url, &vars);
                let info = bootstrap::discover(&self.client, &provider_url, &vars, def).await?;
                vars.extend_strings(info.catalog_vars.clone());
                Some(info)
            }
            None => None,
        };

        let module_path = render(&self.module.path, &vars)?;
        let base_url = render(&self.provider.base_url, &vars)?;
        let base_url = UrlBuilder::new(&base_url, &[&module_path])?.to_string();
        Ok(Session {
            vars,
            base_url,
            post_auth,
        })
    }

    fn context<'a>(&'a self, session: &'a Session) -> RequestContext<'a> {
        RequestContext {
            module: &self.module_id,
            base_url: &session.base_url,
            vars: &session.vars,
            schemas: self.schemas.as_ref(),
            endpoints: &self.endpoints,
            encoding_exceptions: &self.provider.encoding_exceptions,
        }
    }

    /// Identifiers found by post-auth discovery, running it if needed
    pub async fn post_auth_info(&self) -> Result<Option<PostAuthInfo>> {
        Ok(self.session().await?.post_auth.clone())
    }

    /// Bulk job client for this module
    pub async fn bulk(&self) -> Result<BulkClient> {
        let def = self.module.bulk.clone().ok_or_else(|| {
            Error::config(format!(
                "module '{}' of '{}' has no bulk endpoints",
                self.module_id, self.provider.name
            ))
        })?;
        let session = self.session().await?;
        Ok(BulkClient::new(
            self.client.clone(),
            session.base_url.clone(),
            session.vars.clone(),
            def,
        ))
    }

    /// Webhook client for this module
    pub async fn subscriber(&self) -> Result<Subscriber> {
        let def = self.module.webhooks.clone().ok_or_else(|| {
            Error::config(format!(
                "module '{}' of '{}' has no webhook endpoints",
                self.module_id, self.provider.name
            ))
        })?;
        let session = self.session().await?;
        Ok(Subscriber::new(
            self.client.clone(),
            session.base_url.clone(),
            session.vars.clone(),
            def,
        ))
    }

    /// Register webhooks for objects that support subscriptions
    pub async fn subscribe(&self, params: &SubscribeParams) -> Result<SubscribeResult> {
        for object in params.object_events.keys() {
            self.ensure_supported(object, Capability::Subscribe)?;
        }
        self.subscriber().await?.subscribe(params).await
    }
}

#[async_trait]
impl ConnectorApi for Connector {
    fn provider_name(&self) -> &str {
        &self.provider.name
    }

    async fn read(&self, params: &ReadParams) -> Result<ReadResult> {
        Connector::read(self, params).await
    }

    async fn write(&self, params: &WriteParams) -> Result<WriteResult> {
        Connector::write(self, params).await
    }

    async fn delete(&self, params: &DeleteParams) -> Result<DeleteResult> {
        Connector::delete(self, params).await
    }

    async fn list_object_metadata(&self, objects: &[String]) -> Result<ListObjectMetadataResult> {
        Connector::list_object_metadata(self, objects).await
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Connector`]
///
/// Either an [`AuthConfig`] or a ready [`HttpClient`] may be supplied; with
/// neither, requests are sent unauthenticated.
#[must_use]
pub struct ConnectorBuilder {
    provider: ProviderDefinition,
    module: ModuleId,
    auth: Option<AuthConfig>,
    client: Option<HttpClient>,
    handlers: Option<Arc<dyn ProviderHandlers>>,
    schemas: Option<StaticSchemas>,
    metadata: StringMap,
    timeout: Option<Duration>,
}

impl ConnectorBuilder {
    /// Builder for a provider definition, on its root module
    pub fn new(provider: ProviderDefinition) -> Self {
        Self {
            provider,
            module: ModuleId::root(),
            auth: None,
            client: None,
            handlers: None,
            schemas: None,
            metadata: StringMap::new(),
            timeout: None,
        }
    }

    /// Builder for a built-in provider, with its embedded schemas
    pub fn from_builtin(name: &str) -> Result<Self> {
        let provider = load_provider(name)?;
        let schemas = builtin_schemas(name)?;
        let mut builder = Self::new(provider);
        builder.schemas = schemas;
        Ok(builder)
    }

    /// Serve another module
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = ModuleId::new(module);
        self
    }

    /// Authenticate with this configuration
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Authenticate with named credentials in the provider's auth style
    pub fn credentials(mut self, credentials: &StringMap) -> Result<Self> {
        self.auth = Some(self.provider.auth.credentials(credentials)?);
        Ok(self)
    }

    /// Use an already authenticated client
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the definition-driven handlers
    pub fn handlers(mut self, handlers: Arc<dyn ProviderHandlers>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Static schemas for metadata and records keys
    pub fn schemas(mut self, schemas: StaticSchemas) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Connector metadata such as `workspace`, used in URL templates
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Default request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the provider's base URL (tests, sandboxes)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.provider.base_url = base_url.into();
        self
    }

    /// Build the connector
    pub fn build(self) -> Result<Connector> {
        validate_provider(&self.provider)?;
        let module = self.provider.module(&self.module)?.clone();

        let errors = FormatSwitch::from_definitions(&self.provider.error_format);
        let handlers = self
            .handlers
            .unwrap_or_else(|| module_handlers(&module, errors));

        let client = match self.client {
            Some(client) => client,
            None => {
                let mut config = HttpClientConfig::builder();
                if let Some(timeout) = self
                    .timeout
                    .or(self.provider.timeout_secs.map(Duration::from_secs))
                {
                    config = config.timeout(timeout);
                }
                if let Some(rate_limit) = self.provider.rate_limit.clone() {
                    config = config.rate_limit(rate_limit);
                }
                match self.auth {
                    Some(auth) => HttpClient::with_auth(config.build(), auth)?,
                    None => HttpClient::with_config(config.build())?,
                }
            }
        };
        let format = handlers.error_format();
        let client = if format.is_empty() {
            client
        } else {
            client.with_error_format(format)
        };

        let endpoints = endpoint_registry(&self.provider)?;
        let metadata_vars = TemplateContext::from_strings(self.metadata);

        Ok(Connector {
            provider: self.provider,
            module_id: self.module,
            module,
            client,
            handlers,
            endpoints,
            schemas: self.schemas,
            metadata_vars,
            session: OnceCell::new(),
        })
    }
}
