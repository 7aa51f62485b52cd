//! Extraction schema loading.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Cannot read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Schema file {0} must contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Read and parse the JSON schema sent as `data_schema` with every
/// extraction request. The top level must be an object.
pub fn load_schema(path: &Path) -> Result<Value, SchemaError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let schema: Value = serde_json::from_str(&raw).map_err(|source| SchemaError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if !schema.is_object() {
        return Err(SchemaError::NotAnObject(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), "Extraction schema loaded");
    Ok(schema)
}
