//! Test-only, in-memory `ReferenceStore` and scripted `RemoteClient` used by
//! unit and behaviour tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::{
    City, CityUpsert, Country, CountryUpsert, EntityKind, NewPostalCode, PostalCode, ProviderId,
    RecordId, ReferenceStore, Region, RegionUpsert, RemoteClient, RemoteError, Route, StoreError,
};

/// In-memory `ReferenceStore` implementation used in tests.
///
/// Lookups perform a linear scan and are intended only for small datasets.
/// Every successful write bumps [`MemoryStore::writes`], which lets tests
/// assert that a dropped prediction caused no mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    countries: Vec<Country>,
    regions: Vec<Region>,
    cities: Vec<City>,
    postal_codes: Vec<PostalCode>,
    missing: HashSet<EntityKind>,
    next_id: i64,
    writes: usize,
}

impl MemoryStore {
    /// Create a store with a pre-seeded country that has no provider id.
    #[must_use]
    pub fn with_country(sign: &str, name: &str) -> Self {
        let mut store = Self::default();
        store.seed_country(None, sign, name);
        store
    }

    /// Seed a country directly, bypassing the write counter.
    pub fn seed_country(
        &mut self,
        provider_id: Option<ProviderId>,
        sign: &str,
        name: &str,
    ) -> Country {
        let country = Country {
            id: self.allocate_id(),
            provider_id,
            sign: sign.to_owned(),
            name: name.to_owned(),
        };
        self.countries.push(country.clone());
        country
    }

    /// Report `kind` as having no backing from now on.
    #[must_use]
    pub fn without_backing(mut self, kind: EntityKind) -> Self {
        self.missing.insert(kind);
        self
    }

    /// All stored countries in insertion order.
    #[must_use]
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// All stored regions in insertion order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// All stored cities in insertion order.
    #[must_use]
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// All stored postal codes in insertion order.
    #[must_use]
    pub fn postal_codes(&self) -> &[PostalCode] {
        &self.postal_codes
    }

    /// Number of successful writes.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    fn ensure_country(&self, id: RecordId) -> Result<(), StoreError> {
        if self.countries.iter().any(|country| country.id == id) {
            Ok(())
        } else {
            Err(StoreError::MissingParent {
                kind: EntityKind::Country,
                id,
            })
        }
    }
}

impl ReferenceStore for MemoryStore {
    fn check_backing(&self, kind: EntityKind) -> Result<(), StoreError> {
        if self.missing.contains(&kind) {
            return Err(StoreError::Unconfigured { kind });
        }
        Ok(())
    }

    fn find_country_by_sign(&self, sign: &str) -> Result<Option<Country>, StoreError> {
        Ok(self
            .countries
            .iter()
            .find(|country| country.sign.eq_ignore_ascii_case(sign))
            .cloned())
    }

    fn find_country_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Country>, StoreError> {
        Ok(self
            .countries
            .iter()
            .find(|country| country.provider_id == Some(provider_id))
            .cloned())
    }

    fn find_region_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Region>, StoreError> {
        Ok(self
            .regions
            .iter()
            .find(|region| region.provider_id == provider_id)
            .cloned())
    }

    fn find_city_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<City>, StoreError> {
        Ok(self
            .cities
            .iter()
            .find(|city| city.provider_id == provider_id)
            .cloned())
    }

    fn upsert_country(&mut self, record: &CountryUpsert) -> Result<Country, StoreError> {
        self.writes += 1;
        if let Some(existing) = self
            .countries
            .iter_mut()
            .find(|country| country.provider_id == Some(record.provider_id))
        {
            existing.sign.clone_from(&record.sign);
            existing.name.clone_from(&record.name);
            return Ok(existing.clone());
        }
        let country = Country {
            id: self.allocate_id(),
            provider_id: Some(record.provider_id),
            sign: record.sign.clone(),
            name: record.name.clone(),
        };
        self.countries.push(country.clone());
        Ok(country)
    }

    fn upsert_region(&mut self, record: &RegionUpsert) -> Result<Region, StoreError> {
        self.ensure_country(record.country_id)?;
        self.writes += 1;
        if let Some(existing) = self
            .regions
            .iter_mut()
            .find(|region| region.provider_id == record.provider_id)
        {
            existing.name.clone_from(&record.name);
            existing.country_id = record.country_id;
            return Ok(existing.clone());
        }
        let region = Region {
            id: self.allocate_id(),
            provider_id: record.provider_id,
            name: record.name.clone(),
            country_id: record.country_id,
        };
        self.regions.push(region.clone());
        Ok(region)
    }

    fn upsert_city(&mut self, record: &CityUpsert) -> Result<City, StoreError> {
        self.ensure_country(record.country_id)?;
        self.writes += 1;
        if let Some(existing) = self
            .cities
            .iter_mut()
            .find(|city| city.provider_id == record.provider_id)
        {
            existing.name.clone_from(&record.name);
            existing.latitude = record.latitude;
            existing.longitude = record.longitude;
            existing.country_id = record.country_id;
            if record.region_id.is_some() {
                existing.region_id = record.region_id;
            }
            return Ok(existing.clone());
        }
        let city = City {
            id: self.allocate_id(),
            provider_id: record.provider_id,
            name: record.name.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            country_id: record.country_id,
            region_id: record.region_id,
        };
        self.cities.push(city.clone());
        Ok(city)
    }

    fn insert_postal_code(&mut self, record: &NewPostalCode) -> Result<PostalCode, StoreError> {
        if !self.cities.iter().any(|city| city.id == record.city_id) {
            return Err(StoreError::MissingParent {
                kind: EntityKind::City,
                id: record.city_id,
            });
        }
        self.writes += 1;
        let postal_code = PostalCode {
            id: self.allocate_id(),
            code: record.code.clone(),
            slug: record.slug.clone(),
            external_id: record.external_id.clone(),
            city_id: record.city_id,
        };
        self.postal_codes.push(postal_code.clone());
        Ok(postal_code)
    }

    fn postal_codes_for_city(&self, city_id: RecordId) -> Result<Vec<PostalCode>, StoreError> {
        Ok(self
            .postal_codes
            .iter()
            .filter(|code| code.city_id == city_id)
            .cloned()
            .collect())
    }
}

/// A request captured by [`StubRemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested route.
    pub route: Route,
    /// Parameters in the order they were supplied.
    pub params: Vec<(&'static str, String)>,
}

impl RecordedRequest {
    /// Value of the parameter named `name`, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Scripted `RemoteClient` returning one canned response per route.
///
/// Routes without a scripted response answer with an empty JSON array. Every
/// request is recorded for later inspection.
#[derive(Debug, Default)]
pub struct StubRemoteClient {
    responses: HashMap<Route, Result<Value, RemoteError>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubRemoteClient {
    /// Answer `route` with `body`.
    #[must_use]
    pub fn with_response(mut self, route: Route, body: Value) -> Self {
        self.responses.insert(route, Ok(body));
        self
    }

    /// Fail every request to `route` with `error`.
    #[must_use]
    pub fn with_error(mut self, route: Route, error: RemoteError) -> Self {
        self.responses.insert(route, Err(error));
        self
    }

    /// Requests issued so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests issued so far against `route`.
    #[must_use]
    pub fn requests_to(&self, route: Route) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.route == route)
            .collect()
    }
}

impl RemoteClient for StubRemoteClient {
    fn request(
        &self,
        route: Route,
        params: &[(&'static str, String)],
    ) -> Result<Value, RemoteError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                route,
                params: params.to_vec(),
            });
        self.responses
            .get(&route)
            .cloned()
            .unwrap_or_else(|| Ok(Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn upserting_the_same_provider_id_updates_in_place() {
        let mut store = MemoryStore::default();
        let first = store
            .upsert_country(&CountryUpsert {
                provider_id: ProviderId(7),
                sign: "XX".into(),
                name: "Xland".into(),
            })
            .expect("insert");
        let second = store
            .upsert_country(&CountryUpsert {
                provider_id: ProviderId(7),
                sign: "XX".into(),
                name: "Renamed".into(),
            })
            .expect("update");
        assert_eq!(first.id, second.id);
        assert_eq!(store.countries().len(), 1);
        assert_eq!(second.name, "Renamed");
    }

    #[rstest]
    fn regions_require_an_existing_country() {
        let mut store = MemoryStore::default();
        let err = store
            .upsert_region(&RegionUpsert {
                provider_id: ProviderId(1),
                name: "Nowhere".into(),
                country_id: RecordId(99),
            })
            .expect_err("orphan region rejected");
        assert!(matches!(err, StoreError::MissingParent { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[rstest]
    fn stub_records_requests_and_defaults_to_empty() {
        let client = StubRemoteClient::default()
            .with_response(Route::Countries, json!([{ "id": 1, "sign": "DE", "name": "Germany" }]));
        let body = client
            .request(Route::Areas, &[("ids", "5".into())])
            .expect("default response");
        assert_eq!(body, json!([]));
        let countries = client
            .request(Route::Countries, &[("signs", "DE".into())])
            .expect("scripted response");
        assert_eq!(countries[0]["name"], "Germany");
        let recorded = client.requests_to(Route::Areas);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].param("ids"), Some("5"));
    }
}
