use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ExtractionError;

/// Flat field map handed back to the route layer.
pub type NormalizedResult = Map<String, Value>;

/// Which remote job family a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Parse,
    Extraction,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Extraction => "extraction",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified job status. Anything the remote reports that is not a known
/// terminal value stays `Pending` and is bounded by the poll deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

const SUCCESS_STATUSES: &[&str] = &["SUCCESS", "COMPLETED", "DONE"];
const FAILED_STATUSES: &[&str] = &["ERROR", "FAILED"];

impl JobStatus {
    /// Case-insensitive classification of a raw status string.
    pub fn classify(raw: &str) -> Self {
        if SUCCESS_STATUSES.iter().any(|s| raw.eq_ignore_ascii_case(s)) {
            Self::Success
        } else if FAILED_STATUSES.iter().any(|s| raw.eq_ignore_ascii_case(s)) {
            Self::Failed
        } else {
            Self::Pending
        }
    }

    /// Classify the `status` field of a job payload; missing counts as pending.
    pub fn from_payload(payload: &Value) -> Self {
        Self::classify(raw_status(payload))
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The `status` string of a payload, or `""` when absent.
pub fn raw_status(payload: &Value) -> &str {
    payload.get("status").and_then(Value::as_str).unwrap_or("")
}

/// A remote job as returned by a start call.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// `None` when the tenant answered synchronously with a final payload.
    pub id: Option<String>,
    pub status: JobStatus,
    pub payload: Value,
}

impl Job {
    pub fn from_payload(payload: Value) -> Self {
        let id = ["id", "job_id"]
            .iter()
            .filter_map(|key| payload.get(*key).and_then(Value::as_str))
            .find(|id| !id.is_empty())
            .map(str::to_string);
        let status = JobStatus::from_payload(&payload);
        Self {
            id,
            status,
            payload,
        }
    }
}

/// A local document about to be handed to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: PathBuf,
    pub mime: String,
}

impl RemoteFile {
    pub fn new(path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
        }
    }

    /// File name sent in the multipart `filename` parameter.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Shortest spacing between two status checks.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Deadline and spacing for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollConfig {
    /// The interval is raised to [`MIN_POLL_INTERVAL`].
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Build from fractional seconds. A negative or NaN timeout clamps to
    /// zero; the interval never drops below [`MIN_POLL_INTERVAL`].
    pub fn from_secs(timeout_secs: f64, interval_secs: f64) -> Self {
        Self::new(
            secs_to_duration(timeout_secs),
            secs_to_duration(interval_secs),
        )
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_secs(300.0, 1.5)
    }
}

/// Non-positive and NaN become zero; values too large to represent saturate.
pub(crate) fn secs_to_duration(secs: f64) -> Duration {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// A pipeline stage and whether its failure aborts the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub required: bool,
}

pub const PARSE_STAGE: Stage = Stage {
    name: "parse",
    required: false,
};

pub const EXTRACTION_STAGE: Stage = Stage {
    name: "extraction",
    required: true,
};

/// The remote document-intelligence API (allows mocking).
#[async_trait]
pub trait RemoteJobApi: Send + Sync {
    async fn start_parse_job(&self, file: &RemoteFile) -> Result<Job, ExtractionError>;

    async fn poll_parse_job(&self, job_id: &str) -> Result<Value, ExtractionError>;

    async fn upload_file(&self, file: &RemoteFile) -> Result<String, ExtractionError>;

    async fn start_extraction(
        &self,
        file_id: &str,
        schema: &Value,
    ) -> Result<Job, ExtractionError>;

    async fn poll_extraction_job(&self, job_id: &str) -> Result<Value, ExtractionError>;

    async fn fetch_extraction_result(&self, job_id: &str) -> Result<Value, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_classification_is_case_insensitive() {
        for raw in ["success", "SUCCESS", "Success", "completed", "Done"] {
            assert_eq!(JobStatus::classify(raw), JobStatus::Success, "{raw}");
        }
        for raw in ["error", "ERROR", "Failed", "FAILED"] {
            assert_eq!(JobStatus::classify(raw), JobStatus::Failed, "{raw}");
        }
    }

    #[test]
    fn unknown_status_is_pending() {
        for raw in ["", "PENDING", "RUNNING", "CANCELLED", "PARTIAL_SUCCESS", " success"] {
            assert_eq!(JobStatus::classify(raw), JobStatus::Pending, "{raw:?}");
        }
    }

    #[test]
    fn missing_status_field_is_pending() {
        assert_eq!(JobStatus::from_payload(&json!({"id": "j"})), JobStatus::Pending);
        assert_eq!(JobStatus::from_payload(&json!({"status": 3})), JobStatus::Pending);
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn job_id_prefers_id_then_job_id() {
        let job = Job::from_payload(json!({"id": "a", "job_id": "b", "status": "PENDING"}));
        assert_eq!(job.id.as_deref(), Some("a"));

        let job = Job::from_payload(json!({"job_id": "b"}));
        assert_eq!(job.id.as_deref(), Some("b"));

        let job = Job::from_payload(json!({"id": "", "job_id": "b"}));
        assert_eq!(job.id.as_deref(), Some("b"));
    }

    #[test]
    fn job_without_id_keeps_payload() {
        let payload = json!({"data": {"policy": "P-1"}, "status": "SUCCESS"});
        let job = Job::from_payload(payload.clone());
        assert_eq!(job.id, None);
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.payload, payload);
    }

    #[test]
    fn poll_config_clamps_invalid_seconds() {
        let config = PollConfig::from_secs(-5.0, f64::NAN);
        assert_eq!(config.timeout, Duration::ZERO);
        assert_eq!(config.interval, MIN_POLL_INTERVAL);

        let config = PollConfig::new(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(config.interval, MIN_POLL_INTERVAL);

        let config = PollConfig::from_secs(f64::INFINITY, 1.0);
        assert_eq!(config.timeout, Duration::MAX);

        let config = PollConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.interval, Duration::from_millis(1_500));
    }

    #[test]
    fn remote_file_name_falls_back() {
        assert_eq!(RemoteFile::new("/tmp/a/claim.pdf", "application/pdf").file_name(), "claim.pdf");
        assert_eq!(RemoteFile::new("/", "text/plain").file_name(), "document");
    }

    #[test]
    fn stage_policies() {
        assert!(!PARSE_STAGE.required);
        assert!(EXTRACTION_STAGE.required);
    }

    #[test]
    fn remote_api_is_object_safe() {
        fn _assert_api(_: &dyn RemoteJobApi) {}
    }
}
