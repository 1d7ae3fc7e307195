//! Validated, live access to one store's fields.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use cellar_cells::{CellRegistry, InMemoryCellRegistry};
use cellar_schema::SchemaStore;
use cellar_types::{Schema, Value};

use crate::cellar::CellarState;
use crate::error::{CellarError, CellarResult};

/// A view of one origin's store.
///
/// Holds no data of its own: every call takes the cellar lock, looks the
/// store up again, validates the field against the current schema, and
/// routes to the cell registry. Schema migrations made through another
/// accessor or a later `retrieve` are therefore visible immediately.
///
/// Fields can be read and written but never added, removed, or redeclared
/// here; the shape of a store changes only by retrieving it with a new
/// schema.
///
/// An accessor expires when the whole registry is replaced by an import.
/// From then on every call fails with [`CellarError::ExpiredAccessor`].
#[derive(Clone)]
pub struct Accessor {
    state: Arc<RwLock<CellarState>>,
    origin: String,
    epoch: u64,
}

impl Accessor {
    pub(crate) fn new(state: Arc<RwLock<CellarState>>, origin: String, epoch: u64) -> Self {
        Self {
            state,
            origin,
            epoch,
        }
    }

    /// The origin this accessor is bound to.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Read `field`.
    ///
    /// Fails with [`CellarError::UnknownProperty`] if `field` is not in the
    /// current schema. `Ok(None)` means the backing cell is gone.
    pub fn get(&self, field: &str) -> CellarResult<Option<Value>> {
        self.with_store(|store, cells| Ok(store.read(field, cells)?.cloned()))
    }

    /// Read `field` if it currently holds a string.
    pub fn get_string(&self, field: &str) -> CellarResult<Option<String>> {
        Ok(self
            .get(field)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Read `field` if it currently holds a number.
    pub fn get_number(&self, field: &str) -> CellarResult<Option<f64>> {
        Ok(self.get(field)?.and_then(|v| v.as_number()))
    }

    /// Write `field`, coercing `raw` to the field's declared type.
    ///
    /// Fails with [`CellarError::UnknownProperty`] for undeclared fields,
    /// [`CellarError::SchemaCorrupt`] when the declared type is unsupported,
    /// and [`CellarError::UpdateFailed`] if the backing cell has vanished.
    pub fn set(&self, field: &str, raw: impl Into<Value>) -> CellarResult<()> {
        let mut guard = self.state.write().expect("lock poisoned");
        let CellarState { roots, cells, epoch } = &mut *guard;
        let store = live_store(roots, &self.origin, self.epoch, *epoch)?;

        let (id, value) = store.prepare_write(field, raw.into())?;
        if !cells.update(id, value) {
            return Err(CellarError::UpdateFailed {
                origin: self.origin.clone(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    /// The store's current schema.
    pub fn schema(&self) -> CellarResult<Schema> {
        self.with_store(|store, _| Ok(store.schema().clone()))
    }

    /// Names of the fields in the current schema.
    pub fn fields(&self) -> CellarResult<Vec<String>> {
        self.with_store(|store, _| Ok(store.schema().field_names().map(str::to_string).collect()))
    }

    /// Current value of every field whose cell is live.
    pub fn to_map(&self) -> CellarResult<BTreeMap<String, Value>> {
        self.with_store(|store, cells| {
            Ok(store
                .field_map()
                .iter()
                .filter_map(|(field, id)| Some((field.clone(), cells.read(id)?.clone())))
                .collect())
        })
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&SchemaStore, &InMemoryCellRegistry) -> CellarResult<T>,
    ) -> CellarResult<T> {
        let guard = self.state.read().expect("lock poisoned");
        let store = live_store(&guard.roots, &self.origin, self.epoch, guard.epoch)?;
        f(store, &guard.cells)
    }
}

fn live_store<'s>(
    roots: &'s BTreeMap<String, SchemaStore>,
    origin: &str,
    bound_epoch: u64,
    current_epoch: u64,
) -> CellarResult<&'s SchemaStore> {
    if bound_epoch != current_epoch {
        return Err(CellarError::ExpiredAccessor {
            origin: origin.to_string(),
        });
    }
    roots.get(origin).ok_or_else(|| CellarError::ExpiredAccessor {
        origin: origin.to_string(),
    })
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("origin", &self.origin)
            .field("epoch", &self.epoch)
            .finish()
    }
}
