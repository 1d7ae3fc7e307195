//! Addressable value cells for Cellar.
//!
//! A cell is the atomic unit of persisted state: a payload plus an owner tag
//! and an optional lineage link, reachable only by its opaque [`CellId`].
//! Schema stores never hold values directly; they hold cell addresses, which
//! is what lets a value survive a schema migration untouched.
//!
//! # Modules
//!
//! - [`error`] — Error types for cell operations
//! - [`cell`] — The [`Cell`] record
//! - [`traits`] — The [`CellRegistry`] trait defining the storage interface
//! - [`memory`] — In-memory [`InMemoryCellRegistry`]
//!
//! Absence is routine here: reads of a dead address yield `None`, and
//! updates or deletes of one report `false`. Only a failed lineage check on
//! creation is an error.
//!
//! [`CellId`]: cellar_types::CellId

pub mod cell;
pub mod error;
pub mod memory;
pub mod traits;

pub use cell::Cell;
pub use error::{CellError, CellResult};
pub use memory::InMemoryCellRegistry;
pub use traits::CellRegistry;
