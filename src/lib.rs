pub mod api;
pub mod config;
pub mod pipeline;
pub mod schema;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::ServiceConfig;

/// Start the gateway and serve until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // Before tracing so a RUST_LOG from the file applies.
    let dotenv = config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match dotenv {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }

    let config = ServiceConfig::from_env();
    if !config.has_api_token() {
        tracing::warn!(
            "LLAMACLOUD_API_KEY is not set (export it or add it to .env); /api/process will refuse requests"
        );
    }

    let schema = match schema::load_schema(&config.schema_path) {
        Ok(schema) => Some(schema),
        Err(e) => {
            tracing::error!("Failed to load extraction schema: {e}");
            None
        }
    };

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    let ctx = ApiContext::from_config(config, schema)
        .map_err(|e| format!("Cannot build remote client: {e}"))?;

    let server = api::start_server_on(ctx, addr).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        session_id = %server.session.session_id,
        "Backend listening"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }

    server.shutdown_and_wait().await;
    Ok(())
}
