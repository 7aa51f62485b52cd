//! HTTP surface of the extraction gateway.
//!
//! `api_router()` returns a `Router` with the health check and the
//! document processing route nested under `/api/`. `server` owns the
//! listener lifecycle.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerSession};
pub use types::ApiContext;
