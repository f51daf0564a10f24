//! Write: create or update one record

use super::{Connector, WriteParams, WriteResult};
use crate::error::{Error, Result};
use crate::types::Capability;
use tracing::debug;

impl Connector {
    /// Create a record, or update it when `record_id` is set
    pub async fn write(&self, params: &WriteParams) -> Result<WriteResult> {
        let object = params.object_name.trim();
        if object.is_empty() {
            return Err(Error::MissingObjects);
        }
        if params.record_data.is_null() {
            return Err(Error::MissingRecordData {
                object: object.to_string(),
            });
        }
        self.ensure_supported(object, Capability::Write)?;

        let session = self.session().await?;
        let ctx = self.context(session);
        let req = self.handlers.build_write_request(&ctx, params)?;
        debug!(object, create = params.is_create(), "Writing record");

        let response = self.client.execute(&req).await?;
        self.handlers.parse_write_response(&ctx, params, &response)
    }
}
