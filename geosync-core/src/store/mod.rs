//! Persistence boundary for reference records.
//!
//! A [`ReferenceStore`] exposes lookups by natural key (country sign) and by
//! provider id, plus one atomic "insert if absent, otherwise update" operation
//! per deduplicated entity kind. Implementations back the provider-id upsert
//! with a uniqueness constraint so concurrent resolutions of the same id never
//! produce two rows.

use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    City, CityUpsert, Country, CountryUpsert, EntityKind, NewPostalCode, PostalCode, ProviderId,
    RecordId, Region, RegionUpsert,
};

/// Errors raised by a [`ReferenceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The deployment configured no backing for this entity kind.
    #[error("no backing is configured for {kind} records")]
    Unconfigured {
        /// Affected entity kind.
        kind: EntityKind,
    },
    /// The configured backing does not exist.
    #[error("backing {backing:?} configured for {kind} records does not exist")]
    MissingBacking {
        /// Affected entity kind.
        kind: EntityKind,
        /// Configured backing name.
        backing: String,
    },
    /// The configured backing lacks a mapped field.
    #[error("backing {backing:?} for {kind} records has no field {field:?}")]
    MissingField {
        /// Affected entity kind.
        kind: EntityKind,
        /// Configured backing name.
        backing: String,
        /// Mapped field that is absent.
        field: String,
    },
    /// The provider-id field of the backing carries no uniqueness constraint.
    #[error("backing {backing:?} for {kind} records has no unique key on {field:?}")]
    MissingUniqueKey {
        /// Affected entity kind.
        kind: EntityKind,
        /// Configured backing name.
        backing: String,
        /// Provider-id field lacking the constraint.
        field: String,
    },
    /// A provider id cannot be represented by the backing.
    #[error("provider id {provider_id} exceeds the supported integer range")]
    ProviderIdOutOfRange {
        /// Offending provider id.
        provider_id: ProviderId,
    },
    /// A write referenced a parent record that does not exist.
    #[error("{kind} record {id} referenced as a parent does not exist")]
    MissingParent {
        /// Kind of the missing parent.
        kind: EntityKind,
        /// Key of the missing parent.
        id: RecordId,
    },
    /// The underlying storage engine failed.
    #[error("failed to {operation}")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Storage engine error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Whether the error stems from deployment configuration rather than data.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Unconfigured { .. }
                | Self::MissingBacking { .. }
                | Self::MissingField { .. }
                | Self::MissingUniqueKey { .. }
        )
    }

    /// Wrap a storage engine error raised during `operation`.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Keyed persistence for countries, regions, cities and postal codes.
///
/// The `upsert_*` operations are "find by provider id or create, assign the
/// supplied fields, associate the parents, save" as one atomic step. They
/// return the record as stored.
pub trait ReferenceStore {
    /// Verify that the backing for `kind` is configured and exists.
    fn check_backing(&self, kind: EntityKind) -> Result<(), StoreError>;

    /// Find a country by its short sign, ignoring ASCII case.
    fn find_country_by_sign(&self, sign: &str) -> Result<Option<Country>, StoreError>;

    /// Find a country by provider id.
    fn find_country_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Country>, StoreError>;

    /// Find a region by provider id.
    fn find_region_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Region>, StoreError>;

    /// Find a city by provider id.
    fn find_city_by_provider_id(&self, provider_id: ProviderId)
    -> Result<Option<City>, StoreError>;

    /// Insert or refresh the country keyed by `record.provider_id`.
    fn upsert_country(&mut self, record: &CountryUpsert) -> Result<Country, StoreError>;

    /// Insert or refresh the region keyed by `record.provider_id`.
    fn upsert_region(&mut self, record: &RegionUpsert) -> Result<Region, StoreError>;

    /// Insert or refresh the city keyed by `record.provider_id`.
    fn upsert_city(&mut self, record: &CityUpsert) -> Result<City, StoreError>;

    /// Insert a postal code row. Existing rows with the same code are kept.
    fn insert_postal_code(&mut self, record: &NewPostalCode) -> Result<PostalCode, StoreError>;

    /// List the postal codes attached to `city_id`, oldest first.
    fn postal_codes_for_city(&self, city_id: RecordId) -> Result<Vec<PostalCode>, StoreError>;
}

impl<T: ReferenceStore + ?Sized> ReferenceStore for &mut T {
    fn check_backing(&self, kind: EntityKind) -> Result<(), StoreError> {
        (**self).check_backing(kind)
    }

    fn find_country_by_sign(&self, sign: &str) -> Result<Option<Country>, StoreError> {
        (**self).find_country_by_sign(sign)
    }

    fn find_country_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Country>, StoreError> {
        (**self).find_country_by_provider_id(provider_id)
    }

    fn find_region_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Region>, StoreError> {
        (**self).find_region_by_provider_id(provider_id)
    }

    fn find_city_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<City>, StoreError> {
        (**self).find_city_by_provider_id(provider_id)
    }

    fn upsert_country(&mut self, record: &CountryUpsert) -> Result<Country, StoreError> {
        (**self).upsert_country(record)
    }

    fn upsert_region(&mut self, record: &RegionUpsert) -> Result<Region, StoreError> {
        (**self).upsert_region(record)
    }

    fn upsert_city(&mut self, record: &CityUpsert) -> Result<City, StoreError> {
        (**self).upsert_city(record)
    }

    fn insert_postal_code(&mut self, record: &NewPostalCode) -> Result<PostalCode, StoreError> {
        (**self).insert_postal_code(record)
    }

    fn postal_codes_for_city(&self, city_id: RecordId) -> Result<Vec<PostalCode>, StoreError> {
        (**self).postal_codes_for_city(city_id)
    }
}
