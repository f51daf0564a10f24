//! Object metadata
//!
//! Static schemas win when they cover the module. Otherwise each object is
//! resolved live, one request per object, according to the module's
//! metadata settings.

use super::Connector;
use crate::error::{Error, Result};
use crate::provider::MetadataSource;
use crate::schema::{resolve_objects, ListObjectMetadataResult, ObjectMetadata};
use crate::types::normalize_object_name;
use tracing::debug;

impl Connector {
    /// Describe the named objects
    ///
    /// Unknown objects, blank names and per-object failures land in
    /// `errors`; the call itself only fails when the input is unusable.
    pub async fn list_object_metadata(&self, objects: &[String]) -> Result<ListObjectMetadataResult> {
        if objects.is_empty() {
            return Err(Error::MissingObjects);
        }

        if let Some(schemas) = self
            .schemas
            .as_ref()
            .filter(|s| s.has_module(&self.module_id))
        {
            return schemas.select(&self.module_id, objects);
        }

        let (blank, names): (Vec<&String>, Vec<&String>) = objects
            .iter()
            .partition(|name| name.trim().is_empty());
        let names: Vec<String> = names.into_iter().map(|name| normalize_object_name(name)).collect();
        let mut out = if names.is_empty() {
            ListObjectMetadataResult::new()
        } else {
            self.resolve_live(&names).await?
        };
        for name in blank {
            out.insert_error(name.clone(), Error::ObjectNotFound { object: name.clone() });
        }
        Ok(out)
    }

    async fn resolve_live(&self, names: &[String]) -> Result<ListObjectMetadataResult> {
        let settings = &self.module.metadata;
        if settings.source == MetadataSource::Static {
            return Err(Error::config(format!(
                "provider '{}' has no schemas for module '{}'",
                self.provider.name, self.module_id
            )));
        }

        let session = self.session().await?;
        let ctx = self.context(session);
        debug!(objects = names.len(), source = ?settings.source, "Resolving object metadata");

        let fetch = move |name: String| async move {
            if self.capabilities(&name).is_empty() {
                return Err(Error::ObjectNotFound { object: name });
            }
            let req = self.handlers.build_metadata_request(&ctx, &name)?;
            let response = self.client.execute(&req).await?;
            let metadata: ObjectMetadata =
                self.handlers
                    .parse_metadata_response(&ctx, &name, response.json()?)?;
            Ok(metadata)
        };
        Ok(resolve_objects(names, settings.fetch_mode, settings.concurrency, fetch).await)
    }
}
