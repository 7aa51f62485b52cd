//! Health check endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::types::ApiContext;

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    pub schema: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<bool>,
}

/// `GET /api/health`. Any non-empty `schema` query value adds the schema
/// path and whether it loaded.
pub async fn check(
    State(ctx): State<ApiContext>,
    Query(query): Query<HealthQuery>,
) -> Json<HealthResponse> {
    let with_schema = query.schema.is_some_and(|v| !v.is_empty());
    if !with_schema {
        return Json(HealthResponse {
            ok: true,
            schema_path: None,
            loaded: None,
        });
    }

    Json(HealthResponse {
        ok: true,
        schema_path: Some(ctx.config.schema_path.display().to_string()),
        loaded: Some(ctx.schema.is_some()),
    })
}
