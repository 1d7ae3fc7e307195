//! Whole-state export and import.
//!
//! A [`Snapshot`] is the complete state of a cellar: every origin's store and
//! every live cell. Its JSON form has exactly two top-level sections:
//!
//! ```text
//! { "roots": { "<origin>": { "origin", "schema", "map" } },
//!   "uids":  { "<cell id>": { "type", "data", "parent"? } } }
//! ```
//!
//! Importing is a full restore, never a merge, and a snapshot is checked
//! against the store invariants before anything is replaced.

use std::collections::{BTreeMap, HashMap};

use cellar_cells::InMemoryCellRegistry;
use cellar_schema::SchemaStore;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// The complete state of a cellar.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Origin to store.
    pub roots: BTreeMap<String, SchemaStore>,
    /// Address to cell.
    pub uids: InMemoryCellRegistry,
}

/// Decoding target that tolerates missing sections so they can be reported
/// precisely.
#[derive(Deserialize)]
struct PartialSnapshot {
    roots: Option<BTreeMap<String, SchemaStore>>,
    uids: Option<InMemoryCellRegistry>,
}

impl Snapshot {
    /// Decode and validate a combined snapshot.
    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        let partial: PartialSnapshot =
            serde_json::from_str(s).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        let roots = partial.roots.ok_or(SnapshotError::MissingSection("roots"))?;
        let uids = partial.uids.ok_or(SnapshotError::MissingSection("uids"))?;
        Self::validated(roots, uids)
    }

    /// Decode and validate a snapshot stored as two separate blobs.
    pub fn from_sections(roots: &str, uids: &str) -> Result<Self, SnapshotError> {
        let roots = serde_json::from_str(roots)
            .map_err(|e| SnapshotError::Malformed(format!("roots: {e}")))?;
        let uids = serde_json::from_str(uids)
            .map_err(|e| SnapshotError::Malformed(format!("uids: {e}")))?;
        Self::validated(roots, uids)
    }

    /// Encode as one combined document.
    pub fn to_json(&self, pretty: bool) -> Result<String, SnapshotError> {
        encode(self, pretty)
    }

    /// Encode the two sections separately, `(roots, uids)`.
    pub fn to_sections(&self, pretty: bool) -> Result<(String, String), SnapshotError> {
        Ok((encode(&self.roots, pretty)?, encode(&self.uids, pretty)?))
    }

    fn validated(
        roots: BTreeMap<String, SchemaStore>,
        uids: InMemoryCellRegistry,
    ) -> Result<Self, SnapshotError> {
        let snapshot = Self { roots, uids };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that every store is filed under its own origin, matches its
    /// schema, points only at live cells, and shares no cell with any other
    /// field.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut owners: HashMap<_, (&str, &str)> = HashMap::new();
        for (key, store) in &self.roots {
            if key != store.origin() {
                return Err(SnapshotError::Inconsistent(format!(
                    "store {:?} is filed under {key:?}",
                    store.origin()
                )));
            }
            store.check(&self.uids).map_err(SnapshotError::Inconsistent)?;
            for (field, id) in store.field_map() {
                if let Some((origin, other)) = owners.insert(id, (key.as_str(), field.as_str())) {
                    return Err(SnapshotError::Inconsistent(format!(
                        "cell {id} is shared by {origin}.{other} and {key}.{field}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T, pretty: bool) -> Result<String, SnapshotError> {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    result.map_err(|e| SnapshotError::Serialization(e.to_string()))
}
