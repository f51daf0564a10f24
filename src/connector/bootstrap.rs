//! Post-auth discovery

use super::PostAuthInfo;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::jsonquery::JsonQuery;
use crate::provider::PostAuthDefinition;
use crate::template::{render, TemplateContext};
use crate::types::value_to_string;
use crate::url_builder::UrlBuilder;
use std::collections::BTreeMap;
use tracing::debug;

/// Run the discovery call and pull out its variables
///
/// Every declared variable must be present in the reply.
pub(super) async fn discover(
    client: &HttpClient,
    provider_url: &str,
    vars: &TemplateContext,
    def: &PostAuthDefinition,
) -> Result<PostAuthInfo> {
    let path = render(&def.path, vars)?;
    let url = if UrlBuilder::is_absolute(&path) {
        UrlBuilder::parse(&path)?
    } else {
        UrlBuilder::new(provider_url, &[&path])?
    };

    let response = client
        .execute(&HttpRequest::new(def.method, url))
        .await
        .map_err(|e| Error::Bootstrap {
            message: format!("discovery call failed: {e}"),
        })?;
    let body = response.json_or_null();
    let q = JsonQuery::new(&body);

    let mut catalog_vars = BTreeMap::new();
    for (name, path) in &def.vars {
        let value = q.value_optional(path).ok_or_else(|| Error::Bootstrap {
            message: format!("discovery reply has no '{path}' for variable '{name}'"),
        })?;
        catalog_vars.insert(name.clone(), value_to_string(value));
    }
    debug!(vars = ?catalog_vars.keys().collect::<Vec<_>>(), "Post-auth discovery complete");

    Ok(PostAuthInfo {
        catalog_vars,
        raw_response: body,
    })
}
