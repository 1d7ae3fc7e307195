//! The [`CellRegistry`] trait defining the cell storage interface.

use cellar_types::{CellId, Value};

use crate::cell::Cell;
use crate::error::CellResult;

/// Storage backend for addressable value cells.
///
/// Implementations must satisfy these invariants:
/// - Addresses are unique among live cells, deterministically (allocation
///   retries on collision rather than trusting entropy).
/// - A deleted address is dead: reads return `None`, updates and deletes
///   return `false`. Nothing resurrects it.
/// - The registry is type-agnostic. Type enforcement belongs to the layer
///   that knows the schema.
///
/// Implementations carry no locking of their own; the owner of the registry
/// serializes access together with whatever else shares its consistency
/// domain.
pub trait CellRegistry {
    /// Allocate a new cell and return its address.
    ///
    /// Fails with [`CellError::InvalidParent`] when `parent` is given but is
    /// not a live address.
    ///
    /// [`CellError::InvalidParent`]: crate::CellError::InvalidParent
    fn create(&mut self, owner: &str, value: Value, parent: Option<&CellId>) -> CellResult<CellId>;

    /// Look up a whole cell record.
    fn cell(&self, id: &CellId) -> Option<&Cell>;

    /// Overwrite the payload of a live cell. Returns `false` if `id` is dead.
    fn update(&mut self, id: &CellId, value: Value) -> bool;

    /// Release a cell. Returns `false` if `id` was already dead.
    fn delete(&mut self, id: &CellId) -> bool;

    /// Number of live cells.
    fn len(&self) -> usize;

    /// Read the payload of a live cell.
    ///
    /// Returns `None` if `id` is dead.
    fn read(&self, id: &CellId) -> Option<&Value> {
        self.cell(id).map(|cell| &cell.value)
    }

    /// Whether `id` is a live address.
    fn contains(&self, id: &CellId) -> bool {
        self.cell(id).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
