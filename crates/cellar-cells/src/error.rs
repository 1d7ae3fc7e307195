//! Error types for cell operations.

use cellar_types::CellId;
use thiserror::Error;

/// Errors that can occur during cell operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellError {
    /// A cell was created with a parent address that is not live.
    #[error("invalid parent cell: {parent}")]
    InvalidParent { parent: CellId },
}

/// Convenience type alias for cell operations.
pub type CellResult<T> = std::result::Result<T, CellError>;
