//! Facade crate for the geosync reference-data engine.
//!
//! This crate re-exports the core domain types and the resolution engine, and
//! exposes the SQLite store and HTTP client behind the `data` feature.

#![forbid(unsafe_code)]

pub use geosync_core::{
    City, Country, EntityKind, FieldMapping, MappingError, PostalCode, ProviderId, RecordId,
    ReferenceStore, Region, RemoteClient, RemoteError, Route, StoreError,
};
pub use geosync_resolver::{
    DEFAULT_CITY_LIMIT, DEFAULT_LANGUAGE, EngineOptions, ResolutionEngine, ResolveError,
};

#[cfg(feature = "data")]
pub use geosync_data::{HttpRemoteClient, HttpRemoteClientConfig, SqliteReferenceStore};
