//! TOML configuration loading
//!
//! Configuration structs derive `serde::Deserialize` (usually with
//! `#[serde(default)]`) and are read either from a string or from a file.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::types::{Error, Result};

/// Deserialize a configuration from TOML text
pub fn from_toml_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Read and deserialize a TOML configuration file
pub fn load_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Loaded configuration from {}", path.display());
    from_toml_str(&content)
}
