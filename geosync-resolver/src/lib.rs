//! Resolution engine for geographic reference data.
//!
//! [`ResolutionEngine`] answers three questions for its callers: which
//! countries match a set of signs, which regions match a set of provider ids,
//! and which cities match an autocomplete query. Each answer is served from
//! the [`ReferenceStore`](geosync_core::ReferenceStore) where possible and
//! fetched from the [`RemoteClient`](geosync_core::RemoteClient) otherwise;
//! fetched records are upserted on their provider id so repeated resolutions
//! never duplicate rows.
//!
//! Materialising a city walks the dependency chain: its country is resolved by
//! sign (locally first), its region by provider id (best effort), and its
//! postal codes are stored alongside it. Predictions whose country cannot be
//! resolved are dropped without error.
//!
//! A rate-limited provider fails the call. Any other provider failure is
//! logged and treated as an empty response, while store failures propagate.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod city;
mod country;
mod engine;
mod error;
mod prediction;
mod region;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use city::{DEFAULT_CITY_LIMIT, is_postcode_query};
pub use engine::{DEFAULT_LANGUAGE, EngineOptions, ResolutionEngine};
pub use error::ResolveError;
