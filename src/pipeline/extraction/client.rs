use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;

use super::types::{Job, RemoteFile, RemoteJobApi};
use super::{truncate_chars, ExtractionError};

/// Error bodies longer than this are cut before they reach an error value.
const RESPONSE_BODY_LIMIT: usize = 500;

/// Extraction granularity requested for every document.
const EXTRACTION_TARGET: &str = "PER_DOC";

pub const ORGANIZATION_HEADER: &str = "X-LLM-Organization";
pub const PROJECT_HEADER: &str = "X-LLM-Project";

/// Connection settings for the document-intelligence API.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_token,
            organization_id: None,
            project_id: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_tenant(mut self, organization_id: Option<String>, project_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self.project_id = project_id;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP client for the LlamaCloud parse, files and extraction endpoints.
pub struct LlamaCloudClient {
    base_url: String,
    base: Url,
    client: reqwest::Client,
    api_token: Option<String>,
    organization_id: Option<String>,
    project_id: Option<String>,
}

impl LlamaCloudClient {
    pub fn new(config: RemoteConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExtractionError::Transport(format!("Failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ExtractionError::Transport(format!("Invalid base URL: {base_url:?}")))?;

        Ok(Self {
            base_url,
            base,
            client,
            api_token: config.api_token,
            organization_id: config.organization_id,
            project_id: config.project_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`. Each segment is percent-encoded, so a
    /// job id can never escape its path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExtractionError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ExtractionError::Transport(format!("Invalid base URL: {:?}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Bearer token plus optional tenant scoping, applied to every call.
    fn authorized(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(org) = &self.organization_id {
            builder = builder.header(ORGANIZATION_HEADER, org);
        }
        if let Some(project) = &self.project_id {
            builder = builder.header(PROJECT_HEADER, project);
        }
        builder
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, ExtractionError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::RemoteService {
                status: status.as_u16(),
                body: truncate_chars(&body, RESPONSE_BODY_LIMIT),
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ExtractionError::Protocol(format!("Invalid JSON body: {e}")))
    }

    /// Multipart part streaming the file from disk. The handle lives only as
    /// long as the request body.
    async fn file_part(file: &RemoteFile) -> Result<Part, ExtractionError> {
        let local_error = |source| ExtractionError::LocalFile {
            path: file.path.clone(),
            source,
        };
        let handle = tokio::fs::File::open(&file.path).await.map_err(local_error)?;
        let length = handle.metadata().await.map_err(local_error)?.len();

        Part::stream_with_length(handle, length)
            .file_name(file.file_name())
            .mime_str(&file.mime)
            .map_err(|e| ExtractionError::Protocol(format!("Invalid MIME type {}: {e}", file.mime)))
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, ExtractionError> {
        let url = self.endpoint(segments)?;
        self.send_json(self.client.get(url)).await
    }
}

#[derive(Serialize)]
struct ExtractionRunRequest<'a> {
    file_id: &'a str,
    data_schema: &'a Value,
    config: ExtractionRunConfig,
}

#[derive(Serialize)]
struct ExtractionRunConfig {
    extraction_target: &'static str,
}

#[async_trait]
impl RemoteJobApi for LlamaCloudClient {
    async fn start_parse_job(&self, file: &RemoteFile) -> Result<Job, ExtractionError> {
        let form = Form::new().part("file", Self::file_part(file).await?);
        let request = self
            .client
            .post(self.endpoint(&["api", "v1", "parsing", "upload"])?)
            .multipart(form);
        let payload = self.send_json(request).await?;
        Ok(Job::from_payload(payload))
    }

    async fn poll_parse_job(&self, job_id: &str) -> Result<Value, ExtractionError> {
        self.get_json(&["api", "v1", "parsing", "job", job_id]).await
    }

    async fn upload_file(&self, file: &RemoteFile) -> Result<String, ExtractionError> {
        let form = Form::new().part("upload_file", Self::file_part(file).await?);
        let request = self
            .client
            .post(self.endpoint(&["api", "v1", "files"])?)
            .multipart(form);
        let payload = self.send_json(request).await?;

        uploaded_file_id(&payload).map(str::to_string).ok_or_else(|| {
            ExtractionError::Protocol(format!(
                "File upload response has no id: {}",
                truncate_chars(&payload.to_string(), RESPONSE_BODY_LIMIT)
            ))
        })
    }

    async fn start_extraction(
        &self,
        file_id: &str,
        schema: &Value,
    ) -> Result<Job, ExtractionError> {
        let body = ExtractionRunRequest {
            file_id,
            data_schema: schema,
            config: ExtractionRunConfig {
                extraction_target: EXTRACTION_TARGET,
            },
        };
        let request = self
            .client
            .post(self.endpoint(&["api", "v1", "extraction", "run"])?)
            .json(&body);
        let payload = self.send_json(request).await?;
        Ok(Job::from_payload(payload))
    }

    async fn poll_extraction_job(&self, job_id: &str) -> Result<Value, ExtractionError> {
        self.get_json(&["api", "v1", "extraction", "jobs", job_id]).await
    }

    async fn fetch_extraction_result(&self, job_id: &str) -> Result<Value, ExtractionError> {
        self.get_json(&["api", "v1", "extraction", "jobs", job_id, "result"])
            .await
    }
}

/// File id from an upload response: top-level `id`, else nested `file.id`.
pub fn uploaded_file_id(payload: &Value) -> Option<&str> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| payload.get("file").and_then(|f| f.get("id")).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
}

fn transport_error(e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::Transport(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ExtractionError::Transport(format!("Connection failed: {e}"))
    } else if e.is_decode() {
        ExtractionError::Protocol(e.to_string())
    } else {
        ExtractionError::Transport(e.to_string())
    }
}
