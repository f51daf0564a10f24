//! Records by ids

use super::{Connector, Fields, ReadResultRow, RecordsByIdsResult};
use crate::error::{Error, Result};
use crate::provider::RequestContext;
use crate::types::Capability;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::debug;

/// Singleton lookups in flight when the provider has no batch endpoint
pub const MAX_LOOKUP_CONCURRENCY: usize = 8;

impl Connector {
    /// Fetch records by id, one outcome per id in input order
    ///
    /// Ids the provider does not return are reported as `NotFound`; a
    /// failed lookup never aborts the others.
    pub async fn get_records_by_ids(
        &self,
        object_name: &str,
        ids: &[String],
        fields: &Fields,
    ) -> Result<RecordsByIdsResult> {
        let object = object_name.trim();
        if object.is_empty() {
            return Err(Error::MissingObjects);
        }
        if fields.is_empty() {
            return Err(Error::MissingFields {
                object: object.to_string(),
            });
        }
        self.ensure_supported(object, Capability::Read)?;
        if ids.is_empty() {
            return Ok(RecordsByIdsResult::default());
        }

        let session = self.session().await?;
        let ctx = self.context(session);

        if self.handlers.supports_records_by_ids(&ctx, object) {
            debug!(object, ids = ids.len(), "Fetching records in one call");
            let req = self
                .handlers
                .build_records_by_ids_request(&ctx, object, ids, fields)?;
            let response = self.client.execute(&req).await?;
            let rows = self
                .handlers
                .parse_records_by_ids_response(&ctx, object, fields, response.json()?)?;

            let mut by_id: HashMap<String, ReadResultRow> = rows
                .into_iter()
                .filter_map(|row| row.id.clone().map(|id| (id, row)))
                .collect();
            let results = ids
                .iter()
                .map(|id| {
                    let outcome = by_id.remove(id).ok_or_else(|| not_found(object, id));
                    (id.clone(), outcome)
                })
                .collect();
            return Ok(RecordsByIdsResult { results });
        }

        debug!(object, ids = ids.len(), "Fetching records one by one");
        let results = stream::iter(ids)
            .map(|id| async move {
                let outcome = self.fetch_record(&ctx, object, id, fields).await;
                (id.clone(), outcome)
            })
            .buffered(MAX_LOOKUP_CONCURRENCY)
            .collect()
            .await;
        Ok(RecordsByIdsResult { results })
    }

    async fn fetch_record(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<ReadResultRow> {
        let req = self
            .handlers
            .build_record_request(ctx, object, id, fields)?;
        let response = self.client.execute(&req).await?;
        self.handlers
            .parse_record_response(ctx, object, fields, response.json()?)
    }
}

fn not_found(object: &str, id: &str) -> Error {
    Error::from_status(404).with_details([format!("no '{object}' record with id '{id}'")])
}
