//! Delete one record

use super::{Connector, DeleteParams, DeleteResult};
use crate::error::{Error, Result};
use crate::types::Capability;
use tracing::debug;

impl Connector {
    /// Delete a record by id
    pub async fn delete(&self, params: &DeleteParams) -> Result<DeleteResult> {
        let object = params.object_name.trim();
        if object.is_empty() {
            return Err(Error::MissingObjects);
        }
        if params.record_id.trim().is_empty() {
            return Err(Error::MissingRecordId {
                object: object.to_string(),
            });
        }
        self.ensure_supported(object, Capability::Delete)?;

        let session = self.session().await?;
        let ctx = self.context(session);
        let req = self.handlers.build_delete_request(&ctx, params)?;
        debug!(object, id = %params.record_id, "Deleting record");

        let response = self.client.execute(&req).await?;
        self.handlers.parse_delete_response(&ctx, params, &response)
    }
}
