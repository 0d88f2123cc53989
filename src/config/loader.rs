//! Config file loading
//!
//! Distinguishes a source that is simply not there (`Unreadable`, absorbed by
//! callers as an empty contribution) from one that is there but broken
//! (`Unparsable`, always fatal).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::format::ConfigFormat;

/// Errors loading a config file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("config file {} is either not readable or cannot be found: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {} could not be parsed as {format}: {message}", path.display())]
    Unparsable {
        path: PathBuf,
        format: ConfigFormat,
        message: String,
    },

    #[error("config file {} has an unsupported extension '{extension}'", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },
}

impl LoadError {
    /// Whether this error only means "nothing to load here"
    pub fn is_unreadable(&self) -> bool {
        matches!(self, LoadError::Unreadable { .. })
    }
}

/// A successfully parsed config file
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Where the file was read from
    pub path: PathBuf,

    /// Format it was parsed as
    pub format: ConfigFormat,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,

    /// Top-level mapping; empty when the document root is not a mapping
    pub values: Map<String, Value>,
}

impl LoadedConfig {
    /// Look up a top-level section that is itself a mapping
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.values.get(name).and_then(Value::as_object)
    }
}

/// Load and parse a config file, choosing the format from its extension.
pub fn load_config_file(path: &Path) -> Result<LoadedConfig, LoadError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    fs::metadata(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let format =
        ConfigFormat::from_extension(&extension).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.clone(),
        })?;

    load_config_file_as(path, format)
}

/// Load and parse a config file with an explicit format.
pub fn load_config_file_as(path: &Path, format: ConfigFormat) -> Result<LoadedConfig, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    };

    let unparsable = |message: String| LoadError::Unparsable {
        path: path.to_path_buf(),
        format,
        message,
    };

    let contents =
        String::from_utf8(bytes).map_err(|e| unparsable(format!("invalid UTF-8: {}", e)))?;
    let values = match format.parse(&contents).map_err(unparsable)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    debug!(path = %path.display(), %format, keys = values.len(), "loaded config file");

    Ok(LoadedConfig {
        path: path.to_path_buf(),
        format,
        digest,
        values,
    })
}
