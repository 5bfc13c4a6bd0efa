//! Core domain types for the geosync reference-data engine.
//!
//! The crate defines the four reference entities (country, region, city and
//! postal code), the identifiers that link them, and the two boundaries the
//! resolution engine talks to:
//! - [`ReferenceStore`] persists records keyed on provider ids.
//! - [`RemoteClient`] fetches predictions from the reference-data provider.
//!
//! The [`mapping`] module describes how each entity kind maps onto a backing
//! table. Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod entity;
pub mod mapping;
mod remote;
mod slug;
mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use entity::{
    City, CityUpsert, Country, CountryUpsert, EntityKind, NewPostalCode, PostalCode, ProviderId,
    RecordId, Region, RegionUpsert,
};
pub use mapping::{FieldMapping, MappingError};
pub use remote::{QueryParams, RemoteClient, RemoteError, Route};
pub use slug::slugify;
pub use store::{ReferenceStore, StoreError};
