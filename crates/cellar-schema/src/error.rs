//! Error types for schema store operations.

use cellar_cells::CellError;
use thiserror::Error;

/// Errors that can occur when using a schema store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The field is not declared in the store's current schema.
    #[error("property {field:?} is not defined in the schema of {origin:?}")]
    UnknownProperty { origin: String, field: String },

    /// The schema declares a type tag that has no write rules.
    #[error("schema of {origin:?} declares property {field:?} with unsupported type {declared:?}")]
    SchemaCorrupt {
        origin: String,
        field: String,
        declared: String,
    },

    /// Allocating a cell for a new field failed.
    #[error("cell allocation failed: {0}")]
    Cell(#[from] CellError),
}

/// Convenience type alias for schema store operations.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
