//! Read: one page per call

use super::{Connector, ReadParams, ReadResult};
use crate::error::{Error, Result};
use crate::types::Capability;
use tracing::debug;

impl Connector {
    /// Read one page of an object
    ///
    /// Pass the returned `next_page` back in to continue; a `done` page has
    /// an empty token. The time window only applies to the first page.
    pub async fn read(&self, params: &ReadParams) -> Result<ReadResult> {
        let object = params.object_name.trim();
        if object.is_empty() {
            return Err(Error::MissingObjects);
        }
        if params.fields.is_empty() {
            return Err(Error::MissingFields {
                object: object.to_string(),
            });
        }
        self.ensure_supported(object, Capability::Read)?;
        let page_size = self.provider.page_size.resolve(params.page_size)?;

        let session = self.session().await?;
        let ctx = self.context(session);
        let req = self.handlers.build_read_request(&ctx, params, page_size)?;
        debug!(object, page_size, first_page = params.token().is_none(), "Reading page");

        let response = self.client.execute(&req).await?;
        let result = self
            .handlers
            .parse_read_response(&ctx, params, page_size, response.json()?)?;
        debug!(object, rows = result.rows, done = result.done, "Page read");
        Ok(result)
    }
}
