use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the Cellar API.
#[derive(Debug, Error)]
pub enum CellarError {
    /// The key source did not resolve to a usable origin.
    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("property {field:?} is not defined in the schema of {origin:?}")]
    UnknownProperty { origin: String, field: String },

    /// The schema declares a type with no write rules.
    #[error("schema of {origin:?} declares property {field:?} with unsupported type {declared:?}")]
    SchemaCorrupt {
        origin: String,
        field: String,
        declared: String,
    },

    /// A validated write was rejected by the cell registry. The store's
    /// invariants are broken; report it, do not route around it.
    #[error("update of {field:?} on {origin:?} failed: backing cell is gone")]
    UpdateFailed { origin: String, field: String },

    /// The accessor's store no longer exists (the registry was replaced by
    /// an import since the accessor was handed out).
    #[error("accessor for {origin:?} has expired")]
    ExpiredAccessor { origin: String },

    #[error("cell error: {0}")]
    Cell(#[from] cellar_cells::CellError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("medium error: {0}")]
    Medium(#[from] MediumError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<cellar_schema::SchemaError> for CellarError {
    fn from(e: cellar_schema::SchemaError) -> Self {
        use cellar_schema::SchemaError;
        match e {
            SchemaError::UnknownProperty { origin, field } => Self::UnknownProperty { origin, field },
            SchemaError::SchemaCorrupt {
                origin,
                field,
                declared,
            } => Self::SchemaCorrupt {
                origin,
                field,
                declared,
            },
            SchemaError::Cell(e) => Self::Cell(e),
        }
    }
}

/// Errors from exporting or importing a full snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The blob is not valid snapshot JSON.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// A required top-level section is absent.
    #[error("snapshot is missing the {0:?} section")]
    MissingSection(&'static str),

    /// The snapshot decodes but violates store invariants.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from a persistence medium.
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Keys must be plain file names.
    #[error("invalid medium key: {0:?}")]
    InvalidKey(String),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

pub type CellarResult<T> = Result<T, CellarError>;
