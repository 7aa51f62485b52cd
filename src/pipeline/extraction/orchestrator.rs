use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::client::LlamaCloudClient;
use super::normalize::normalize_result;
use super::poller::{poll_until, PollOutcome};
use super::types::{
    raw_status, JobKind, JobStatus, NormalizedResult, PollConfig, RemoteFile, RemoteJobApi,
    Stage, EXTRACTION_STAGE, PARSE_STAGE,
};
use super::ExtractionError;
use crate::config::ServiceConfig;

/// Drives one document through optional parse and required extraction.
///
/// Holds only immutable configuration and a shared client, so one instance
/// can serve any number of concurrent documents.
pub struct ExtractionOrchestrator {
    client: Arc<dyn RemoteJobApi>,
    parse_poll: PollConfig,
    extract_poll: PollConfig,
    parse_enabled: bool,
}

impl ExtractionOrchestrator {
    pub fn new(client: Arc<dyn RemoteJobApi>, parse_poll: PollConfig, extract_poll: PollConfig) -> Self {
        Self {
            client,
            parse_poll,
            extract_poll,
            parse_enabled: true,
        }
    }

    /// Orchestrator backed by the HTTP client described in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ExtractionError> {
        let client = LlamaCloudClient::new(config.remote.clone())?;
        Ok(Self::new(Arc::new(client), config.parse_poll, config.extract_poll)
            .with_parse_enabled(config.parse_enabled))
    }

    pub fn with_parse_enabled(mut self, enabled: bool) -> Self {
        self.parse_enabled = enabled;
        self
    }

    pub fn parse_enabled(&self) -> bool {
        self.parse_enabled
    }

    /// Run the full pipeline with the orchestrator's default parse policy.
    pub async fn process_document(
        &self,
        path: &Path,
        mime: &str,
        schema: &Value,
    ) -> Result<NormalizedResult, ExtractionError> {
        self.process_document_with(path, mime, schema, self.parse_enabled)
            .await
    }

    /// Run the full pipeline, choosing per call whether to parse first.
    pub async fn process_document_with(
        &self,
        path: &Path,
        mime: &str,
        schema: &Value,
        parse: bool,
    ) -> Result<NormalizedResult, ExtractionError> {
        let start = Instant::now();
        let file = RemoteFile::new(path, mime);
        tracing::info!(file = %file.file_name(), mime, parse, "Starting document extraction");

        if parse {
            run_stage(&PARSE_STAGE, self.run_parse(&file)).await?;
        }

        let result = run_stage(&EXTRACTION_STAGE, self.run_extraction(&file, schema)).await?;

        tracing::info!(
            fields = result.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document extraction complete"
        );
        Ok(result)
    }

    async fn run_parse(&self, file: &RemoteFile) -> Result<Option<String>, ExtractionError> {
        let job = self.client.start_parse_job(file).await?;
        let Some(job_id) = job.id else {
            tracing::info!(status = ?job.status, "Parse returned without a job id, treating as complete");
            return Ok(None);
        };

        tracing::info!(job_id = %job_id, "Parse job started");
        self.await_terminal(JobKind::Parse, &job_id, &self.parse_poll)
            .await?;
        tracing::info!(job_id = %job_id, "Parse job finished");
        Ok(Some(job_id))
    }

    async fn run_extraction(
        &self,
        file: &RemoteFile,
        schema: &Value,
    ) -> Result<NormalizedResult, ExtractionError> {
        let file_id = self.client.upload_file(file).await?;
        tracing::info!(file_id = %file_id, "Document uploaded for extraction");

        let job = self.client.start_extraction(&file_id, schema).await?;
        let payload = match job.id {
            None => {
                tracing::info!("Extraction returned a final payload synchronously");
                job.payload
            }
            Some(job_id) => {
                tracing::info!(job_id = %job_id, "Extraction job started");
                self.await_terminal(JobKind::Extraction, &job_id, &self.extract_poll)
                    .await?;
                self.client.fetch_extraction_result(&job_id).await?
            }
        };

        Ok(normalize_result(payload))
    }

    /// Poll a job until it reports a terminal status. Failure statuses raise
    /// immediately; running out of time becomes `ExtractionError::Timeout`.
    async fn await_terminal(
        &self,
        kind: JobKind,
        job_id: &str,
        config: &PollConfig,
    ) -> Result<Value, ExtractionError> {
        let outcome = poll_until(config, || self.check_job(kind, job_id)).await?;

        match outcome {
            PollOutcome::Ready(payload) => Ok(payload),
            PollOutcome::TimedOut { attempts, elapsed } => {
                tracing::warn!(%kind, job_id, attempts, "Gave up waiting for job");
                Err(ExtractionError::Timeout {
                    kind,
                    job_id: job_id.to_string(),
                    waited: elapsed,
                })
            }
        }
    }

    /// One status check: `Some(payload)` once successful, `None` while pending.
    async fn check_job(
        &self,
        kind: JobKind,
        job_id: &str,
    ) -> Result<Option<Value>, ExtractionError> {
        let payload = match kind {
            JobKind::Parse => self.client.poll_parse_job(job_id).await?,
            JobKind::Extraction => self.client.poll_extraction_job(job_id).await?,
        };

        match JobStatus::from_payload(&payload) {
            JobStatus::Success => Ok(Some(payload)),
            JobStatus::Failed => Err(ExtractionError::JobFailed {
                kind,
                job_id: job_id.to_string(),
                status: raw_status(&payload).to_string(),
            }),
            JobStatus::Pending => {
                tracing::debug!(%kind, job_id, status = raw_status(&payload), "Job pending");
                Ok(None)
            }
        }
    }
}

/// Run one stage under its policy. A required stage propagates its error;
/// an optional stage logs it and yields the default value instead.
pub async fn run_stage<T, Fut>(stage: &Stage, work: Fut) -> Result<T, ExtractionError>
where
    T: Default,
    Fut: Future<Output = Result<T, ExtractionError>>,
{
    match work.await {
        Ok(value) => Ok(value),
        Err(e) if !stage.required => {
            tracing::warn!(
                stage = stage.name,
                code = e.code(),
                error = %e,
                "Optional stage failed, continuing"
            );
            Ok(T::default())
        }
        Err(e) => {
            tracing::error!(stage = stage.name, code = e.code(), error = %e, "Stage failed");
            Err(e)
        }
    }
}
