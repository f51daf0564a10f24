//! Batch write: chunked, order-preserving

use super::{BatchWriteParams, BatchWriteResult, Connector, WriteParams, WriteRecord, WriteResult};
use crate::error::{Error, Result};
use crate::provider::RequestContext;
use crate::types::Capability;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// Chunk size when the provider states no limit
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Upper bound on chunks in flight
pub const MAX_BATCH_CONCURRENCY: usize = 4;

impl Connector {
    /// Write many records of one object
    ///
    /// Records are split into chunks no larger than the provider's batch
    /// limit. A failed chunk fails only its own records; results always
    /// follow input order. Providers without a batch endpoint get one write
    /// per record.
    pub async fn batch_write(&self, params: &BatchWriteParams) -> Result<BatchWriteResult> {
        let object = params.object_name.trim();
        if object.is_empty() {
            return Err(Error::MissingObjects);
        }
        if params.records.iter().any(|r| r.record_data.is_null()) {
            return Err(Error::MissingRecordData {
                object: object.to_string(),
            });
        }
        self.ensure_supported(object, Capability::Write)?;
        if params.records.is_empty() {
            return Ok(BatchWriteResult::default());
        }

        let concurrency = params.concurrency.clamp(1, MAX_BATCH_CONCURRENCY);
        let session = self.session().await?;
        let ctx = self.context(session);

        let Some(limit) = self.handlers.batch_limit(&ctx, object) else {
            debug!(object, records = params.records.len(), "No batch endpoint, writing records one by one");
            let results = stream::iter(&params.records)
                .map(|record| {
                    let write = WriteParams {
                        object_name: object.to_string(),
                        record_id: record.record_id.clone(),
                        record_data: record.record_data.clone(),
                    };
                    async move { self.write(&write).await }
                })
                .buffered(concurrency)
                .collect()
                .await;
            return Ok(BatchWriteResult { results });
        };

        let size = if limit == 0 { DEFAULT_BATCH_SIZE } else { limit };
        debug!(object, records = params.records.len(), chunk_size = size, concurrency, "Writing batch");

        let chunks: Vec<Vec<Result<WriteResult>>> = stream::iter(params.records.chunks(size))
            .map(|chunk| async move {
                match self.write_chunk(&ctx, object, chunk).await {
                    Ok(outcomes) => outcomes,
                    Err(e) => {
                        warn!(object, records = chunk.len(), error = %e, "Batch chunk failed");
                        spread_failure(e, chunk.len())
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        Ok(BatchWriteResult {
            results: chunks.into_iter().flatten().collect(),
        })
    }

    async fn write_chunk(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        chunk: &[WriteRecord],
    ) -> Result<Vec<Result<WriteResult>>> {
        let req = self
            .handlers
            .build_batch_write_request(ctx, object, chunk)?;
        let response = self.client.execute(&req).await?;
        self.handlers
            .parse_batch_write_response(ctx, object, chunk, &response)
    }
}

/// One error per record of a failed chunk
fn spread_failure(error: Error, records: usize) -> Vec<Result<WriteResult>> {
    let mut out = Vec::with_capacity(records);
    for _ in 1..records {
        out.push(Err(copy_error(&error)));
    }
    out.push(Err(error));
    out
}

fn copy_error(error: &Error) -> Error {
    match error {
        Error::Api {
            kind,
            status,
            details,
        } => Error::api(*kind, *status, details.clone()),
        other => Error::Other(format!("batch chunk failed: {other}")),
    }
}
