//! High-level API for Cellar.
//!
//! A [`Cellar`] hands out [`Accessor`]s for named stores. The caller
//! supplies each store's schema; the cellar keeps every field's value in an
//! independently addressed cell, migrates stores when their schema changes,
//! and validates and coerces every read and write.
//!
//! ```
//! use cellar_sdk::{Cellar, Schema, Value};
//!
//! let cellar = Cellar::in_memory();
//! let player = cellar
//!     .retrieve("player", Some(Schema::new().with_field("name", "string").with_field("hp", "number")))
//!     .unwrap();
//! player.set("hp", "17").unwrap();
//! assert_eq!(player.get("hp").unwrap(), Some(Value::Number(17.0)));
//! ```
//!
//! Persistence goes through a [`Medium`]; the full state can also be moved
//! around as a single JSON document with [`Cellar::export_all`] and
//! [`Cellar::import_all`].

pub mod accessor;
pub mod cellar;
pub mod config;
pub mod error;
pub mod medium;
pub mod origin;
pub mod snapshot;

pub use accessor::Accessor;
pub use cellar::Cellar;
pub use config::CellarConfig;
pub use error::{CellarError, CellarResult, ConfigError, MediumError, SnapshotError};
pub use medium::{FileMedium, InMemoryMedium, Medium};
pub use origin::{KeyProvider, KeySource, StorageKey};
pub use snapshot::Snapshot;

// Re-export key types
pub use cellar_schema::ReconcileReport;
pub use cellar_types::{CellId, FieldType, Schema, Value};
