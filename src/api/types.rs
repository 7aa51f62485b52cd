//! Shared state and upload limits for the route layer.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ServiceConfig;
use crate::pipeline::extraction::{ExtractionError, ExtractionOrchestrator};

/// Largest accepted document (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart boundaries and headers on top of the document itself.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Document types the remote parser accepts.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
];

/// Shared context for every route. Cheap to clone.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<ServiceConfig>,
    pub orchestrator: Arc<ExtractionOrchestrator>,
    /// `None` when the schema file failed to load at startup.
    pub schema: Option<Arc<Value>>,
}

impl ApiContext {
    pub fn new(
        config: ServiceConfig,
        orchestrator: ExtractionOrchestrator,
        schema: Option<Value>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            schema: schema.map(Arc::new),
        }
    }

    /// Context with an orchestrator built from `config`.
    pub fn from_config(config: ServiceConfig, schema: Option<Value>) -> Result<Self, ExtractionError> {
        let orchestrator = ExtractionOrchestrator::from_config(&config)?;
        Ok(Self::new(config, orchestrator, schema))
    }
}

/// Lowercased MIME type without parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn mime_essence(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_allowed_mime(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_essence(mime).as_str())
}

/// MIME type for an upload: the declared type when it says anything useful,
/// otherwise a guess from the file extension.
pub fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    declared
        .map(mime_essence)
        .filter(|m| !m.is_empty() && m != "application/octet-stream")
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        })
}

/// Strip a client-supplied file name down to something safe to create on disk.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized.to_string()
    }
}
