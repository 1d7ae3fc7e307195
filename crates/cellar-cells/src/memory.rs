//! In-memory cell registry.
//!
//! [`InMemoryCellRegistry`] keeps every cell in a `BTreeMap` keyed by
//! address, so iteration and serialized output are deterministic.

use std::collections::BTreeMap;

use cellar_types::{CellId, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::Cell;
use crate::error::{CellError, CellResult};
use crate::traits::CellRegistry;

/// An in-memory implementation of [`CellRegistry`].
///
/// Serializes as a plain address-to-cell object.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryCellRegistry {
    cells: BTreeMap<CellId, Cell>,
}

impl InMemoryCellRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a sorted list of all live addresses.
    pub fn all_ids(&self) -> Vec<CellId> {
        self.cells.keys().cloned().collect()
    }

    /// Draw addresses from `next` until one is not live.
    fn allocate_address(&self, mut next: impl FnMut() -> CellId) -> CellId {
        loop {
            let id = next();
            if !self.cells.contains_key(&id) {
                return id;
            }
            debug!(%id, "cell address collision, retrying");
        }
    }

    fn insert_cell(
        &mut self,
        id: CellId,
        owner: &str,
        value: Value,
        parent: Option<&CellId>,
    ) -> CellResult<CellId> {
        if let Some(parent) = parent {
            if !self.cells.contains_key(parent) {
                warn!(%parent, owner, "refusing to create cell with dead parent");
                return Err(CellError::InvalidParent {
                    parent: parent.clone(),
                });
            }
        }
        self.cells
            .insert(id.clone(), Cell::new(owner, value, parent.cloned()));
        debug!(%id, owner, "cell created");
        Ok(id)
    }
}

impl CellRegistry for InMemoryCellRegistry {
    fn create(&mut self, owner: &str, value: Value, parent: Option<&CellId>) -> CellResult<CellId> {
        let id = self.allocate_address(CellId::random);
        self.insert_cell(id, owner, value, parent)
    }

    fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    fn update(&mut self, id: &CellId, value: Value) -> bool {
        match self.cells.get_mut(id) {
            Some(cell) => {
                cell.value = value;
                true
            }
            None => false,
        }
    }

    fn delete(&mut self, id: &CellId) -> bool {
        self.cells.remove(id).is_some()
    }

    fn len(&self) -> usize {
        self.cells.len()
    }
}

impl std::fmt::Debug for InMemoryCellRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCellRegistry")
            .field("cell_count", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(owner: &str, value: Value) -> (InMemoryCellRegistry, CellId) {
        let mut cells = InMemoryCellRegistry::new();
        let id = cells.create(owner, value, None).unwrap();
        (cells, id)
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn create_and_read() {
        let (cells, id) = registry_with("player", Value::from("Vik"));
        assert_eq!(cells.read(&id), Some(&Value::from("Vik")));
        assert_eq!(cells.cell(&id).unwrap().owner, "player");
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn read_unknown_address_is_none() {
        let cells = InMemoryCellRegistry::new();
        assert!(cells.read(&CellId::from_blocks(1, 2)).is_none());
    }

    #[test]
    fn update_overwrites_in_place() {
        let (mut cells, id) = registry_with("player", Value::from(""));
        assert!(cells.update(&id, Value::from(17)));
        assert_eq!(cells.read(&id), Some(&Value::Number(17.0)));
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn update_is_type_agnostic() {
        let (mut cells, id) = registry_with("player", Value::from(3));
        assert!(cells.update(&id, Value::from("three")));
        assert_eq!(cells.read(&id), Some(&Value::from("three")));
    }

    #[test]
    fn update_dead_address_reports_false() {
        let mut cells = InMemoryCellRegistry::new();
        assert!(!cells.update(&CellId::from_blocks(1, 2), Value::from("x")));
        assert!(cells.is_empty());
    }

    #[test]
    fn delete_then_access_is_dead() {
        let (mut cells, id) = registry_with("player", Value::from("Vik"));
        assert!(cells.delete(&id));
        assert!(cells.read(&id).is_none());
        assert!(!cells.contains(&id));
        assert!(!cells.update(&id, Value::from("again")));
        assert!(cells.read(&id).is_none());
    }

    #[test]
    fn double_delete_reports_false() {
        let (mut cells, id) = registry_with("player", Value::from("Vik"));
        assert!(cells.delete(&id));
        assert!(!cells.delete(&id));
    }

    // -----------------------------------------------------------------------
    // Lineage
    // -----------------------------------------------------------------------

    #[test]
    fn create_with_live_parent() {
        let (mut cells, parent) = registry_with("inventory", Value::from(""));
        let child = cells
            .create("inventory", Value::from("sword"), Some(&parent))
            .unwrap();
        assert_eq!(cells.cell(&child).unwrap().parent.as_ref(), Some(&parent));
    }

    #[test]
    fn create_with_dead_parent_fails() {
        let mut cells = InMemoryCellRegistry::new();
        let ghost = CellId::from_blocks(9, 9);
        let err = cells
            .create("inventory", Value::from("sword"), Some(&ghost))
            .unwrap_err();
        assert_eq!(err, CellError::InvalidParent { parent: ghost });
        assert!(cells.is_empty());
    }

    #[test]
    fn parent_deletion_does_not_cascade() {
        let (mut cells, parent) = registry_with("inventory", Value::from(""));
        let child = cells
            .create("inventory", Value::from("sword"), Some(&parent))
            .unwrap();
        assert!(cells.delete(&parent));
        assert_eq!(cells.read(&child), Some(&Value::from("sword")));
    }

    // -----------------------------------------------------------------------
    // Address allocation
    // -----------------------------------------------------------------------

    #[test]
    fn allocation_retries_on_collision() {
        let (cells, taken) = registry_with("player", Value::from(""));
        let fresh = CellId::from_blocks(7, 7);
        let mut script = vec![fresh.clone(), taken.clone(), taken.clone()];

        let id = cells.allocate_address(|| script.pop().unwrap());
        assert_eq!(id, fresh);
        assert!(script.is_empty());
    }

    #[test]
    fn serializes_as_address_map() {
        let mut cells = InMemoryCellRegistry::new();
        let id = cells
            .insert_cell(CellId::from_blocks(1, 1), "player", Value::from(5), None)
            .unwrap();
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, format!(r#"{{"{id}":{{"type":"player","data":5.0}}}}"#));

        let parsed: InMemoryCellRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cells);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn live_addresses_never_collide(ops in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut cells = InMemoryCellRegistry::new();
            let mut live: Vec<CellId> = Vec::new();

            for create in ops {
                if create || live.is_empty() {
                    let id = cells.create("prop", Value::default(), None).unwrap();
                    prop_assert!(!live.contains(&id));
                    live.push(id);
                } else {
                    let id = live.swap_remove(0);
                    prop_assert!(cells.delete(&id));
                }
            }

            let unique: HashSet<_> = cells.all_ids().into_iter().collect();
            prop_assert_eq!(unique.len(), live.len());
            prop_assert_eq!(cells.len(), live.len());
        }
    }
}
