//! Document processing endpoint.
//!
//! `POST /api/process` takes one multipart `file` part, stages it in the
//! upload directory for the lifetime of the request, and runs the
//! extraction pipeline against the loaded schema.

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    is_allowed_mime, resolve_mime, sanitize_filename, ApiContext, MAX_UPLOAD_BYTES,
};
use crate::config::parse_flag;
use crate::pipeline::extraction::NormalizedResult;

const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct ProcessQuery {
    /// Overrides the configured parse-first policy for this request.
    pub parse_then_extract: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub ok: bool,
    pub extracted_data: NormalizedResult,
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// `POST /api/process`.
pub async fn process(
    State(ctx): State<ApiContext>,
    Query(query): Query<ProcessQuery>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("process", request_id = %request_id);
    handle(ctx, query, multipart).instrument(span).await
}

async fn handle(
    ctx: ApiContext,
    query: ProcessQuery,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    if !ctx.config.has_api_token() {
        return Err(ApiError::MissingApiKey);
    }

    let upload = read_upload(&mut multipart)
        .await?
        .ok_or(ApiError::UnsupportedType(None))?;

    let mime = resolve_mime(upload.content_type.as_deref(), &upload.file_name);
    if !is_allowed_mime(&mime) {
        tracing::info!(file = %upload.file_name, mime = %mime, "Rejected upload type");
        return Err(ApiError::UnsupportedType(Some(mime)));
    }

    let schema = ctx.schema.clone().ok_or_else(|| {
        ApiError::SchemaNotLoaded(ctx.config.schema_path.display().to_string())
    })?;

    let parse = match query.parse_then_extract.as_deref() {
        None => ctx.orchestrator.parse_enabled(),
        Some(raw) => parse_flag(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("parse_then_extract must be a boolean, got {raw:?}"))
        })?,
    };

    tracing::info!(
        file = %upload.file_name,
        mime = %mime,
        size = upload.bytes.len(),
        parse,
        "Processing upload"
    );

    // Dropping the guard removes the staged copy, whatever the outcome.
    let (_staging, path) = stage_upload(&ctx, &upload).await?;

    let extracted = ctx
        .orchestrator
        .process_document_with(&path, &mime, &schema, parse)
        .await?;

    Ok(Json(ProcessResponse {
        ok: true,
        extracted_data: extracted,
    }))
}

/// First `file` part of the form, or `None` when the form has none.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("document").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::PayloadTooLarge {
                limit_bytes: MAX_UPLOAD_BYTES,
            });
        }

        return Ok(Some(Upload {
            file_name,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

/// Write the upload into a fresh directory under the upload dir, keeping the
/// client's (sanitized) file name so the remote sees a meaningful name.
async fn stage_upload(
    ctx: &ApiContext,
    upload: &Upload,
) -> Result<(tempfile::TempDir, PathBuf), ApiError> {
    let upload_dir = &ctx.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot create {}: {e}", upload_dir.display())))?;

    let staging = tempfile::Builder::new()
        .prefix("upload-")
        .tempdir_in(upload_dir)
        .map_err(|e| ApiError::Internal(format!("Cannot create staging dir: {e}")))?;

    let path = staging.path().join(sanitize_filename(&upload.file_name));
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot stage upload: {e}")))?;

    Ok((staging, path))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit_bytes: MAX_UPLOAD_BYTES,
        }
    } else {
        ApiError::BadRequest(e.body_text())
    }
}
