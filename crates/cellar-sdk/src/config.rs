use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a persisted cellar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellarConfig {
    /// Directory holding the persisted blobs.
    pub data_dir: PathBuf,
    /// Medium key of the store registry blob.
    pub roots_file: String,
    /// Medium key of the cell registry blob.
    pub uids_file: String,
    /// Pretty-print exported JSON.
    pub pretty: bool,
}

impl Default for CellarConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".cellar"),
            roots_file: "roots.json".into(),
            uids_file: "uids.json".into(),
            pretty: false,
        }
    }
}

impl CellarConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a TOML file, or return defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
