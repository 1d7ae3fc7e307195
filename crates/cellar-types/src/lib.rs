//! Foundation types for Cellar.
//!
//! This crate provides the identity, value, and schema types shared by every
//! other Cellar crate.
//!
//! # Key Types
//!
//! - [`CellId`] — Opaque, randomly generated address of a stored value cell
//! - [`Value`] — The payload held by a cell (string or number)
//! - [`FieldType`] — Declared type tag of a schema field
//! - [`Schema`] — Mapping from field name to declared type

pub mod cell_id;
pub mod error;
pub mod schema;
pub mod value;

pub use cell_id::CellId;
pub use error::TypeError;
pub use schema::{FieldType, Schema};
pub use value::Value;
