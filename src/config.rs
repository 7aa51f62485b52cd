use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::extraction::types::secs_to_duration;
use crate::pipeline::extraction::{PollConfig, RemoteConfig};

/// Application-level constants
pub const APP_NAME: &str = "docextract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "https://api.cloud.llamaindex.ai";
pub const DEFAULT_SCHEMA_PATH: &str = "schema/insurance.schema.json";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PORT: u16 = 4000;

const DEFAULT_POLL_TIMEOUT_SECS: f64 = 300.0;
const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.5;
const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 60.0;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docextract_lib=info,docextract=info,tower_http=warn"
}

/// Everything the service reads from its environment, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub remote: RemoteConfig,
    pub parse_poll: PollConfig,
    pub extract_poll: PollConfig,
    pub parse_enabled: bool,
    pub schema_path: PathBuf,
    pub upload_dir: PathBuf,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServiceConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secs = |key: &str, default: f64| match get(key) {
            None => default,
            Some(raw) => raw.parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, default, "Invalid number in config, using default");
                default
            }),
        };

        // Spacing between status checks; zero would poll in a tight loop.
        let interval = |key: &str| match secs(key, DEFAULT_POLL_INTERVAL_SECS) {
            v if v.is_finite() && v > 0.0 => v,
            v => {
                tracing::warn!(key, value = v, default = DEFAULT_POLL_INTERVAL_SECS, "Invalid number in config, using default");
                DEFAULT_POLL_INTERVAL_SECS
            }
        };

        let remote = RemoteConfig::new(
            &get("LLAMACLOUD_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            get("LLAMACLOUD_API_KEY"),
        )
        .with_tenant(get("LLAMA_ORG_ID"), get("LLAMA_PROJECT_ID"))
        .with_request_timeout(
            secs_to_duration(secs("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS))
                .max(Duration::from_secs(1)),
        );

        let parse_enabled = match get("PARSE_ENABLED") {
            None => true,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid PARSE_ENABLED, using default");
                true
            }),
        };

        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid PORT, using default");
                DEFAULT_PORT
            }),
        };

        Self {
            remote,
            parse_poll: PollConfig::from_secs(
                secs("PARSE_POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS),
                interval("PARSE_POLL_INTERVAL_SECS"),
            ),
            extract_poll: PollConfig::from_secs(
                secs("EXTRACT_POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS),
                interval("EXTRACT_POLL_INTERVAL_SECS"),
            ),
            parse_enabled,
            schema_path: PathBuf::from(
                get("EXTRACTION_SCHEMA_PATH").unwrap_or_else(|| DEFAULT_SCHEMA_PATH.to_string()),
            ),
            upload_dir: PathBuf::from(
                get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            port,
        }
    }

    pub fn has_api_token(&self) -> bool {
        self.remote.api_token.is_some()
    }
}

/// Load `.env` from the working directory or one of its parents into the
/// process environment. Variables that are already set keep their value.
/// Returns the file that was loaded, or `None` when there is none.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Same as [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Parse a boolean-ish flag (`1/0`, `true/false`, `yes/no`, `on/off`).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
