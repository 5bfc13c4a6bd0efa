//! Adapters connecting the geosync engine to the outside world.
//!
//! Responsibilities:
//! - [`remote`] talks to the reference-data provider over authenticated HTTP.
//! - [`store`] persists reference records in SQLite, driven by the
//!   [`FieldMapping`](geosync_core::FieldMapping).
//!
//! Boundaries:
//! - Do not encode resolution rules (live in `geosync-resolver`).
//! - Keep blocking I/O off async executors; the HTTP client blocks on its
//!   own runtime.
//!
//! Invariants:
//! - Provider-id upserts are single statements guarded by a uniqueness
//!   constraint.
//! - No global mutable state.

mod fs;
pub mod remote;
pub mod store;

pub use remote::{ClientBuildError, HttpRemoteClient, HttpRemoteClientConfig};
pub use store::{SchemaError, SqliteReferenceStore, StoreOpenError};
