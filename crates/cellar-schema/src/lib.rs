//! Schema-bound stores for Cellar.
//!
//! A [`SchemaStore`] binds the field names of one origin's [`Schema`] to cell
//! addresses. Changing the schema runs a three-way diff
//! ([`SchemaStore::reconcile`]): surviving fields keep their cell (and so
//! their value), new fields get fresh cells, and dropped fields release
//! theirs.
//!
//! Writes are validated and coerced here too ([`coerce`]), so that every
//! front end applies the same rules.
//!
//! [`Schema`]: cellar_types::Schema

pub mod coerce;
pub mod error;
pub mod store;

pub use coerce::{coerce, parse_int};
pub use error::{SchemaError, SchemaResult};
pub use store::{ReconcileReport, SchemaStore};
