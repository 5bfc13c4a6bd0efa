//! SQLite persistence for reference records.
//!
//! The module is split into focused submodules:
//! - [`layout`] turns a [`FieldMapping`](geosync_core::FieldMapping) into the
//!   SQL used against each backing table.
//! - [`schema`] creates the configured tables, uniqueness constraints and
//!   indexes.
//! - [`sqlite`] implements [`ReferenceStore`](geosync_core::ReferenceStore)
//!   on a `rusqlite` connection.
#![forbid(unsafe_code)]

mod layout;
mod schema;
mod sqlite;

pub use schema::{SchemaError, initialise_schema};
pub use sqlite::{SqliteReferenceStore, StoreOpenError};

#[cfg(test)]
mod tests;
