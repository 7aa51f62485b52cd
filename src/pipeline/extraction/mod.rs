//! Remote document extraction: job client, poller, normalization and the
//! orchestrator that chains them for one uploaded document.

pub mod types;
pub mod client;
pub mod poller;
pub mod normalize;
pub mod orchestrator;

#[cfg(test)]
mod pipeline_tests;

pub use types::*;
pub use client::*;
pub use poller::*;
pub use normalize::*;
pub use orchestrator::*;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Upper bound on error messages surfaced to callers of the orchestrator.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Remote service returned error (status {status}): {body}")]
    RemoteService { status: u16, body: String },

    #[error("Unexpected response from remote service: {0}")]
    Protocol(String),

    #[error("{kind} job {job_id} did not finish within {:.1}s", .waited.as_secs_f64())]
    Timeout {
        kind: JobKind,
        job_id: String,
        waited: Duration,
    },

    #[error("{kind} job {job_id} ended with status {status}")]
    JobFailed {
        kind: JobKind,
        job_id: String,
        status: String,
    },

    #[error("Cannot reach remote service: {0}")]
    Transport(String),

    #[error("Cannot open document {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RemoteService { .. } => "REMOTE_SERVICE",
            Self::Protocol(_) => "PROTOCOL",
            Self::Timeout { .. } => "TIMEOUT",
            Self::JobFailed { .. } => "JOB_FAILED",
            Self::Transport(_) => "TRANSPORT",
            Self::LocalFile { .. } => "LOCAL_FILE",
        }
    }

    /// Display message capped at `MAX_ERROR_MESSAGE_CHARS`.
    pub fn bounded_message(&self) -> String {
        truncate_chars(&self.to_string(), MAX_ERROR_MESSAGE_CHARS)
    }
}

/// Truncate on a char boundary, marking the cut with an ellipsis.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
