//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`; CORS mirrors the caller's origin and
//! allows credentials so a browser front end on another port can call it.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::{ApiContext, MAX_UPLOAD_BYTES, MULTIPART_OVERHEAD_BYTES};

/// Build the API router.
///
/// Handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/process", post(endpoints::process::process))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::very_permissive())
}
