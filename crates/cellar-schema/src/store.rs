//! The [`SchemaStore`] and its migration logic.

use std::collections::{BTreeMap, BTreeSet};

use cellar_cells::CellRegistry;
use cellar_types::{CellId, FieldType, Schema, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coerce::coerce;
use crate::error::{SchemaError, SchemaResult};

/// One origin's named fields, each backed by a cell.
///
/// The keys of the field map are always exactly the fields of the schema.
/// Both change together, and only through [`SchemaStore::reconcile`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaStore {
    origin: String,
    schema: Schema,
    #[serde(rename = "map")]
    field_map: BTreeMap<String, CellId>,
}

/// Outcome of a [`SchemaStore::reconcile`] call, by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Fields in both schemas; their cells were carried over.
    pub kept: Vec<String>,
    /// Fields new in this schema; fresh cells were allocated.
    pub added: Vec<String>,
    /// Fields dropped by this schema; their cells were released.
    pub removed: Vec<String>,
    /// Dropped fields whose cell was already gone. Tolerated, not an error.
    pub missing: Vec<String>,
    /// Fields whose declared type changed. Their stored value is kept as-is
    /// until the next write coerces it.
    pub retyped: Vec<String>,
}

impl ReconcileReport {
    /// Whether the reconcile changed the shape of the store.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.retyped.is_empty()
    }
}

impl SchemaStore {
    /// Create the store for `origin` and allocate a cell for every field of
    /// `schema`.
    pub fn create<R>(origin: impl Into<String>, schema: Schema, cells: &mut R) -> SchemaResult<Self>
    where
        R: CellRegistry + ?Sized,
    {
        let mut store = Self {
            origin: origin.into(),
            schema: Schema::new(),
            field_map: BTreeMap::new(),
        };
        store.reconcile(schema, cells)?;
        Ok(store)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Field name to cell address, in field order.
    pub fn field_map(&self) -> &BTreeMap<String, CellId> {
        &self.field_map
    }

    /// Migrate this store to `new_schema`.
    ///
    /// Three-way diff against the current schema:
    /// 1. fields in both keep their cell address, and therefore their value;
    /// 2. fields only in `new_schema` get a fresh cell holding the type's
    ///    default value, owned by this store's origin;
    /// 3. fields only in the current schema have their cell deleted. A cell
    ///    that is already gone is recorded in [`ReconcileReport::missing`]
    ///    and otherwise ignored.
    ///
    /// The schema and field map are replaced together at the end. If a cell
    /// allocation fails, cells allocated so far are released and the store
    /// is left exactly as it was.
    pub fn reconcile<R>(&mut self, new_schema: Schema, cells: &mut R) -> SchemaResult<ReconcileReport>
    where
        R: CellRegistry + ?Sized,
    {
        let mut report = ReconcileReport::default();
        let mut map = BTreeMap::new();

        for (field, ty) in new_schema.iter() {
            let Some(id) = self.field_map.get(field) else {
                continue;
            };
            if let Some(old) = self.schema.get(field) {
                if old != ty {
                    warn!(
                        origin = %self.origin,
                        field,
                        from = %old,
                        to = %ty,
                        "field changed declared type; stored value kept until next write"
                    );
                    report.retyped.push(field.to_string());
                }
            }
            map.insert(field.to_string(), id.clone());
            report.kept.push(field.to_string());
        }

        for (field, ty) in new_schema.iter() {
            if self.field_map.contains_key(field) {
                continue;
            }
            match cells.create(&self.origin, ty.default_value(), None) {
                Ok(id) => {
                    map.insert(field.to_string(), id);
                    report.added.push(field.to_string());
                }
                Err(e) => {
                    for added in &report.added {
                        if let Some(id) = map.get(added) {
                            cells.delete(id);
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        for (field, id) in &self.field_map {
            if map.contains_key(field) {
                continue;
            }
            if !cells.delete(id) {
                // Double deletion during migration is tolerated; the field
                // is being dropped either way.
                warn!(origin = %self.origin, field = %field, %id, "cell of removed field was already gone");
                report.missing.push(field.clone());
            }
            report.removed.push(field.clone());
        }

        self.schema = new_schema;
        self.field_map = map;

        debug!(
            origin = %self.origin,
            kept = report.kept.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            "schema reconciled"
        );
        Ok(report)
    }

    /// Declared type of `field`.
    pub fn field_type(&self, field: &str) -> SchemaResult<&FieldType> {
        self.schema
            .get(field)
            .ok_or_else(|| self.unknown_property(field))
    }

    /// Cell address backing `field`.
    pub fn cell_of(&self, field: &str) -> SchemaResult<&CellId> {
        if !self.schema.contains(field) {
            return Err(self.unknown_property(field));
        }
        self.field_map
            .get(field)
            .ok_or_else(|| self.unknown_property(field))
    }

    /// Read the current value of `field`.
    ///
    /// `Ok(None)` means the field is declared but its cell is gone, which
    /// only a corrupted registry can produce.
    pub fn read<'c, R>(&self, field: &str, cells: &'c R) -> SchemaResult<Option<&'c Value>>
    where
        R: CellRegistry + ?Sized,
    {
        let id = self.cell_of(field)?;
        Ok(cells.read(id))
    }

    /// Validate a write to `field` and return the target cell together with
    /// the coerced value. Nothing is written.
    pub fn prepare_write(&self, field: &str, raw: Value) -> SchemaResult<(&CellId, Value)> {
        let id = self.cell_of(field)?;
        let declared = self.field_type(field)?;
        let value = coerce(declared, raw).ok_or_else(|| SchemaError::SchemaCorrupt {
            origin: self.origin.clone(),
            field: field.to_string(),
            declared: declared.to_string(),
        })?;
        Ok((id, value))
    }

    /// Check the store's invariants against `cells`.
    ///
    /// Returns a description of the first violation: a field map that does
    /// not match the schema, or a field whose cell is not live.
    pub fn check<R>(&self, cells: &R) -> Result<(), String>
    where
        R: CellRegistry + ?Sized,
    {
        let declared: BTreeSet<&str> = self.schema.field_names().collect();
        let mapped: BTreeSet<&str> = self.field_map.keys().map(String::as_str).collect();
        if declared != mapped {
            return Err(format!(
                "store {:?}: mapped fields {mapped:?} do not match schema fields {declared:?}",
                self.origin
            ));
        }
        for (field, id) in &self.field_map {
            if !cells.contains(id) {
                return Err(format!(
                    "store {:?}: field {field:?} points at dead cell {id}",
                    self.origin
                ));
            }
        }
        Ok(())
    }

    fn unknown_property(&self, field: &str) -> SchemaError {
        SchemaError::UnknownProperty {
            origin: self.origin.clone(),
            field: field.to_string(),
        }
    }
}
