use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid cell address {address:?}: {reason}")]
    InvalidCellId { address: String, reason: String },
}
