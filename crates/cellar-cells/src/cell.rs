//! The [`Cell`] record.

use cellar_types::{CellId, Value};
use serde::{Deserialize, Serialize};

/// A single stored value.
///
/// The persisted field names (`type`, `data`, `parent`) match the layout of
/// existing saves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Origin of the store family that allocated this cell. Diagnostic only.
    #[serde(rename = "type")]
    pub owner: String,
    #[serde(rename = "data")]
    pub value: Value,
    /// Lineage link checked at creation time. Never followed afterwards and
    /// never implies ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
}

impl Cell {
    pub fn new(owner: impl Into<String>, value: Value, parent: Option<CellId>) -> Self {
        Self {
            owner: owner.into(),
            value,
            parent,
        }
    }
}
