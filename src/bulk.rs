//! Bulk load jobs
//!
//! Ingest jobs follow a create → upload → close → poll → results cycle:
//!
//! ```text
//! Open → UploadComplete → InProgress → {Complete | Failed | Aborted}
//! ```
//!
//! CSV is streamed to the provider and results are streamed back, so memory
//! use does not grow with file size. Each job is polled independently.
//! Dropping a poll future stops polling but leaves the server-side job
//! running; call [`BulkClient::abort_job`] to stop it.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::jsonquery::JsonQuery;
use crate::template::{render, render_value, TemplateContext};
use crate::types::{JsonValue, Method};
use crate::url_builder::UrlBuilder;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// Definition
// ============================================================================

fn default_jobs_path() -> String {
    "jobs/ingest".to_string()
}

fn default_create_body() -> JsonValue {
    json!({
        "object": "{object}",
        "operation": "{operation}",
        "externalIdFieldName": "{externalIdField}",
        "contentType": "CSV",
        "lineEnding": "LF",
    })
}

fn default_id_path() -> String {
    "id".to_string()
}

fn default_state_path() -> String {
    "state".to_string()
}

fn default_upload_path() -> String {
    "{jobId}/batches".to_string()
}

fn default_content_type() -> String {
    "text/csv".to_string()
}

fn default_upload_method() -> Method {
    Method::PUT
}

fn default_close_method() -> Method {
    Method::PATCH
}

fn default_close_body() -> JsonValue {
    json!({ "state": "UploadComplete" })
}

fn default_abort_body() -> JsonValue {
    json!({ "state": "Aborted" })
}

fn default_successful_path() -> String {
    "{jobId}/successfulResults".to_string()
}

fn default_failed_path() -> String {
    "{jobId}/failedResults".to_string()
}

fn default_unprocessed_path() -> String {
    "{jobId}/unprocessedrecords".to_string()
}

fn default_error_message_path() -> String {
    "errorMessage".to_string()
}

/// Bulk ingest endpoints of a module
///
/// Paths under a job are relative to `jobs_path` and may use `{jobId}`.
/// The create body is a JSON template over `{object}`, `{operation}` and
/// `{externalIdField}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkDefinition {
    #[serde(default = "default_jobs_path")]
    pub jobs_path: String,
    #[serde(default = "default_create_body")]
    pub create_body: JsonValue,
    #[serde(default = "default_id_path")]
    pub id_path: String,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_error_message_path")]
    pub error_message_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default = "default_upload_method")]
    pub upload_method: Method,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_close_method")]
    pub close_method: Method,
    #[serde(default = "default_close_body")]
    pub close_body: JsonValue,
    #[serde(default = "default_abort_body")]
    pub abort_body: JsonValue,
    #[serde(default = "default_successful_path")]
    pub successful_results_path: String,
    #[serde(default = "default_failed_path")]
    pub failed_results_path: String,
    #[serde(default = "default_unprocessed_path")]
    pub unprocessed_records_path: String,
}

impl Default for BulkDefinition {
    fn default() -> Self {
        Self {
            jobs_path: default_jobs_path(),
            create_body: default_create_body(),
            id_path: default_id_path(),
            state_path: default_state_path(),
            error_message_path: default_error_message_path(),
            upload_path: default_upload_path(),
            upload_method: default_upload_method(),
            content_type: default_content_type(),
            close_method: default_close_method(),
            close_body: default_close_body(),
            abort_body: default_abort_body(),
            successful_results_path: default_successful_path(),
            failed_results_path: default_failed_path(),
            unprocessed_records_path: default_unprocessed_path(),
        }
    }
}

// ============================================================================
// Job Types
// ============================================================================

/// Server-side job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Open,
    UploadComplete,
    InProgress,
    Complete,
    Failed,
    Aborted,
}

impl JobState {
    /// Map a provider state string, ignoring case and separators
    pub fn from_provider(state: &str) -> Option<Self> {
        let normalized: String = state
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "open" | "created" => Some(Self::Open),
            "uploadcomplete" => Some(Self::UploadComplete),
            "inprogress" | "running" => Some(Self::InProgress),
            "jobcomplete" | "complete" | "completed" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            "aborted" | "cancelled" | "canceled" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Whether the job can still change state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Aborted)
    }
}

/// What a bulk job does with each row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    #[default]
    Insert,
    Update,
    Upsert,
    Delete,
}

impl BulkOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// Parameters of a bulk write
#[derive(Debug, Clone, Default)]
pub struct BulkWriteParams {
    pub object_name: String,
    pub operation: BulkOperation,
    /// Match key for upserts
    pub external_id_field: Option<String>,
}

impl BulkWriteParams {
    /// Bulk operation over an object
    pub fn new(object_name: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object_name: object_name.into(),
            operation,
            external_id_field: None,
        }
    }

    #[must_use]
    pub fn external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }
}

/// Job state as last reported
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub raw: JsonValue,
}

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollConfig {
    /// Five seconds between polls, ten minutes in total
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// Bulk operations for one module
#[derive(Debug, Clone)]
pub struct BulkClient {
    client: HttpClient,
    base_url: String,
    vars: TemplateContext,
    def: BulkDefinition,
}

impl BulkClient {
    /// Client over a rendered module base URL
    pub fn new(
        client: HttpClient,
        base_url: impl Into<String>,
        vars: TemplateContext,
        def: BulkDefinition,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            vars,
            def,
        }
    }

    fn jobs_url(&self) -> Result<UrlBuilder> {
        let path = render(&self.def.jobs_path, &self.vars)?;
        if UrlBuilder::is_absolute(&path) {
            return UrlBuilder::parse(&path);
        }
        UrlBuilder::new(&self.base_url, &[&path])
    }

    fn job_url(&self, job_id: &str, template: &str) -> Result<UrlBuilder> {
        let mut vars = self.vars.clone();
        vars.set("jobId", UrlBuilder::encode_segment(job_id)?);
        let path = render(template, &vars)?;
        let mut url = self.jobs_url()?;
        for segment in path.split('/') {
            url.add_path(segment);
        }
        Ok(url)
    }

    fn job_info(&self, body: &JsonValue, fallback_id: Option<&str>) -> Result<JobInfo> {
        let q = JsonQuery::new(body);
        let id = match (q.id_optional(&self.def.id_path), fallback_id) {
            (Some(id), _) => id,
            (None, Some(id)) => id.to_string(),
            (None, None) => return Err(Error::missing_values("bulk job response has no id")),
        };
        let state_name = q.str_required(&self.def.state_path)?;
        let state = JobState::from_provider(state_name)
            .ok_or_else(|| Error::bulk(&id, format!("unknown job state '{state_name}'")))?;
        let error_message = q
            .str_optional(&self.def.error_message_path)?
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        Ok(JobInfo {
            id,
            state,
            error_message,
            raw: body.clone(),
        })
    }

    /// Create an ingest job
    pub async fn create_job(&self, params: &BulkWriteParams) -> Result<JobInfo> {
        let mut vars = self.vars.clone();
        vars.set("object", params.object_name.as_str())
            .set("operation", params.operation.as_str())
            .set(
                "externalIdField",
                params.external_id_field.clone().unwrap_or_default(),
            );
        let body = render_value(&self.def.create_body, &vars)?;

        let response = self
            .client
            .execute(&crate::http::HttpRequest::post(self.jobs_url()?, body))
            .await?;
        let job = self.job_info(response.json()?, None)?;
        info!(job_id = %job.id, object = %params.object_name, state = ?job.state, "Created bulk job");
        Ok(job)
    }

    /// Stream CSV data into an open job
    pub async fn upload<S>(&self, job_id: &str, csv: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Sync + 'static,
    {
        let url = self.job_url(job_id, &self.def.upload_path)?;
        debug!(job_id, "Uploading bulk data");
        self.client
            .upload(
                self.def.upload_method,
                &url,
                &self.def.content_type,
                reqwest::Body::wrap_stream(csv),
            )
            .await?;
        Ok(())
    }

    async fn set_state(&self, job_id: &str, body: &JsonValue) -> Result<JobInfo> {
        let url = self.job_url(job_id, "")?;
        let req = crate::http::HttpRequest::new(self.def.close_method, url).with_body(body.clone());
        let response = self.client.execute(&req).await?;
        self.job_info(&response.json_or_null(), Some(job_id))
    }

    /// Mark the upload complete so processing starts
    pub async fn close_job(&self, job_id: &str) -> Result<JobInfo> {
        let job = self.set_state(job_id, &self.def.close_body).await?;
        info!(job_id, state = ?job.state, "Closed bulk job");
        Ok(job)
    }

    /// Stop a job on the server
    pub async fn abort_job(&self, job_id: &str) -> Result<JobInfo> {
        let job = self.set_state(job_id, &self.def.abort_body).await?;
        info!(job_id, state = ?job.state, "Aborted bulk job");
        Ok(job)
    }

    /// Current job state
    pub async fn get_job_info(&self, job_id: &str) -> Result<JobInfo> {
        let response = self
            .client
            .execute(&crate::http::HttpRequest::get(self.job_url(job_id, "")?))
            .await?;
        self.job_info(response.json()?, Some(job_id))
    }

    /// Create a job, stream the CSV into it and close it
    pub async fn bulk_write<S>(&self, params: &BulkWriteParams, csv: S) -> Result<JobInfo>
    where
        S: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Sync + 'static,
    {
        let job = self.create_job(params).await?;
        self.upload(&job.id, csv).await?;
        self.close_job(&job.id).await
    }

    /// Poll until the job reaches a terminal state
    ///
    /// Failed and aborted jobs are returned, not raised; check `state`.
    pub async fn wait_for_completion(&self, job_id: &str, poll: &PollConfig) -> Result<JobInfo> {
        let mut last = None;
        for attempt in 1..=poll.max_polls {
            let job = self.get_job_info(job_id).await?;
            if last != Some(job.state) {
                info!(job_id, state = ?job.state, attempt, "Bulk job state");
                last = Some(job.state);
            }
            if job.state.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll.interval).await;
        }
        Err(Error::bulk(
            job_id,
            format!("not finished after {} polls", poll.max_polls),
        ))
    }

    /// Rows the job processed, as CSV
    pub async fn successful_results(&self, job_id: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let url = self.job_url(job_id, &self.def.successful_results_path)?;
        self.client.download(&url).await
    }

    /// Rows the job rejected, as CSV with an error column
    pub async fn failed_results(&self, job_id: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let url = self.job_url(job_id, &self.def.failed_results_path)?;
        self.client.download(&url).await
    }

    /// Rows never processed, typically after an abort
    pub async fn unprocessed_records(
        &self,
        job_id: &str,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let url = self.job_url(job_id, &self.def.unprocessed_records_path)?;
        self.client.download(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::{stream, TryStreamExt};
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use wiremock::matchers::{body_json, body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bulk_client(server: &MockServer) -> BulkClient {
        BulkClient::new(
            HttpClient::new().unwrap(),
            format!("{}/services/data/v60.0", server.uri()),
            TemplateContext::new(),
            BulkDefinition::default(),
        )
    }

    fn csv(text: &'static str) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        stream::iter(vec![Ok(Bytes::from_static(text.as_bytes()))])
    }

    #[test_case("Open", JobState::Open)]
    #[test_case("UploadComplete", JobState::UploadComplete)]
    #[test_case("InProgress", JobState::InProgress)]
    #[test_case("in_progress", JobState::InProgress)]
    #[test_case("JobComplete", JobState::Complete)]
    #[test_case("Failed", JobState::Failed)]
    #[test_case("Aborted", JobState::Aborted)]
    fn test_job_state_mapping(raw: &str, expected: JobState) {
        assert_eq!(JobState::from_provider(raw), Some(expected));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Complete.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Open.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
        assert_eq!(JobState::from_provider("Paused"), None);
    }

    #[tokio::test]
    async fn test_bulk_write_creates_uploads_and_closes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/data/v60.0/jobs/ingest"))
            .and(body_json(json!({
                "object": "Contact",
                "operation": "upsert",
                "externalIdFieldName": "Email",
                "contentType": "CSV",
                "lineEnding": "LF",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "750x", "state": "Open"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/services/data/v60.0/jobs/ingest/750x/batches"))
            .and(body_string("Email,LastName\na@b,Doe\n"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .and(body_json(json!({"state": "UploadComplete"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "750x", "state": "UploadComplete"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params =
            BulkWriteParams::new("Contact", BulkOperation::Upsert).external_id_field("Email");
        let job = bulk_client(&server)
            .bulk_write(&params, csv("Email,LastName\na@b,Doe\n"))
            .await
            .unwrap();

        assert_eq!(job.id, "750x");
        assert_eq!(job.state, JobState::UploadComplete);
    }

    #[tokio::test]
    async fn test_wait_for_completion_returns_terminal_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "750x", "state": "InProgress"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "750x", "state": "JobComplete"})),
            )
            .mount(&server)
            .await;

        let poll = PollConfig::default().interval(Duration::from_millis(10));
        let job = bulk_client(&server)
            .wait_for_completion("750x", &poll)
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Complete);
    }

    #[tokio::test]
    async fn test_wait_for_completion_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "750x", "state": "InProgress"})),
            )
            .mount(&server)
            .await;

        let poll = PollConfig::default()
            .interval(Duration::from_millis(1))
            .max_polls(3);
        let err = bulk_client(&server)
            .wait_for_completion("750x", &poll)
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::BulkJob));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_job_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "750x",
                "state": "Failed",
                "errorMessage": "InvalidBatch : Field name not found",
            })))
            .mount(&server)
            .await;

        let job = bulk_client(&server)
            .wait_for_completion("750x", &PollConfig::default())
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("InvalidBatch : Field name not found")
        );
    }

    #[tokio::test]
    async fn test_abort_and_result_streams() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/services/data/v60.0/jobs/ingest/750x"))
            .and(body_json(json!({"state": "Aborted"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "750x", "state": "Aborted"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x/failedResults"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("\"sf__Id\",\"sf__Error\"\n\"\",\"bad\"\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v60.0/jobs/ingest/750x/unprocessedrecords"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Email\nx@y\n"))
            .mount(&server)
            .await;

        let bulk = bulk_client(&server);
        assert_eq!(bulk.abort_job("750x").await.unwrap().state, JobState::Aborted);

        let chunks: Vec<Bytes> = bulk.failed_results("750x").await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"\"sf__Id\",\"sf__Error\"\n\"\",\"bad\"\n".to_vec());

        let chunks: Vec<Bytes> = bulk
            .unprocessed_records("750x")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"Email\nx@y\n".to_vec());
    }
}
