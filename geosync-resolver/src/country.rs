//! Country resolution: local lookup by sign, one batched remote fetch for the
//! rest.

use std::collections::HashSet;

use geosync_core::{Country, CountryUpsert, ReferenceStore, RemoteClient, Route};

use crate::engine::ResolutionEngine;
use crate::error::ResolveError;
use crate::prediction::CountryPrediction;

impl<S, C> ResolutionEngine<S, C>
where
    S: ReferenceStore,
    C: RemoteClient,
{
    /// Resolve countries by sign.
    ///
    /// Signs found in the store are returned as stored. The remaining signs
    /// are requested from the provider in a single batch, upserted on their
    /// provider id and appended to the result. Signs compare without regard
    /// to ASCII case; duplicate and blank signs are ignored. When every sign
    /// is local no request is made.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RateLimited`] when the provider throttles the
    /// batch; countries already found locally are discarded in that case.
    /// Store failures surface as [`ResolveError::Configuration`] or
    /// [`ResolveError::Store`].
    pub fn resolve_countries<I>(
        &mut self,
        signs: I,
        language: Option<&str>,
    ) -> Result<Vec<Country>, ResolveError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.ensure_backings()?;

        let mut seen = HashSet::new();
        let mut countries = Vec::new();
        let mut remaining = Vec::new();
        for sign in signs {
            let trimmed = sign.as_ref().trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_ascii_uppercase()) {
                continue;
            }
            match self.store.find_country_by_sign(trimmed)? {
                Some(country) => countries.push(country),
                None => remaining.push(trimmed.to_owned()),
            }
        }
        if remaining.is_empty() {
            return Ok(countries);
        }

        let params = vec![
            ("signs", remaining.join(",")),
            ("language", self.language(language)),
        ];
        let predictions: Vec<CountryPrediction> = self.fetch(Route::Countries, &params)?;
        for prediction in predictions {
            let country = self.store.upsert_country(&CountryUpsert {
                provider_id: prediction.id,
                sign: prediction.sign,
                name: prediction.name,
            })?;
            countries.push(country);
        }
        Ok(countries)
    }

    /// Resolve the parent country of a region or city prediction.
    ///
    /// `None` means the prediction must be dropped.
    pub(crate) fn parent_country(
        &mut self,
        sign: Option<&str>,
        language: &str,
    ) -> Result<Option<Country>, ResolveError> {
        let Some(wanted) = sign.map(str::trim).filter(|value| !value.is_empty()) else {
            return Ok(None);
        };
        let resolved = self.resolve_countries([wanted], Some(language))?;
        Ok(resolved
            .into_iter()
            .find(|country| country.sign.eq_ignore_ascii_case(wanted)))
    }
}

#[cfg(test)]
mod tests {
    use geosync_core::test_support::{MemoryStore, StubRemoteClient};
    use geosync_core::{ProviderId, RemoteError};
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::test_support::country_prediction;

    type Engine = ResolutionEngine<MemoryStore, StubRemoteClient>;

    #[fixture]
    fn germany() -> MemoryStore {
        MemoryStore::with_country("DE", "Germany")
    }

    fn engine_with(store: MemoryStore, client: StubRemoteClient) -> Engine {
        ResolutionEngine::new(store, client)
    }

    #[rstest]
    fn local_signs_make_no_remote_calls(germany: MemoryStore) {
        let mut engine = engine_with(germany, StubRemoteClient::default());
        let countries = engine
            .resolve_countries(["DE", "DE", " "], None)
            .expect("resolved");
        assert_eq!(countries.len(), 1);
        assert!(engine.client().requests().is_empty());
    }

    #[rstest]
    fn absent_signs_are_fetched_in_one_batch(germany: MemoryStore) {
        let client = StubRemoteClient::default().with_response(
            Route::Countries,
            json!([country_prediction(7, "XX", "Xland"), country_prediction(8, "YY", "Yland")]),
        );
        let mut engine = engine_with(germany, client);
        let countries = engine
            .resolve_countries(["XX", "DE", "YY"], Some("uk"))
            .expect("resolved");

        let signs: Vec<&str> = countries.iter().map(|c| c.sign.as_str()).collect();
        assert_eq!(signs, ["DE", "XX", "YY"]);
        let requests = engine.client().requests();
        assert_eq!(requests.len(), 1);
        let request = requests.first().expect("one request");
        assert_eq!(request.route, Route::Countries);
        assert_eq!(request.param("signs"), Some("XX,YY"));
        assert_eq!(request.param("language"), Some("uk"));
    }

    #[rstest]
    fn fetched_countries_answer_later_lookups_in_any_case() {
        let client = StubRemoteClient::default().with_response(
            Route::Countries,
            json!([country_prediction(7, "XX", "Xland")]),
        );
        let mut engine = engine_with(MemoryStore::default(), client);
        let first = engine.resolve_countries(["XX"], None).expect("first");
        let second = engine.resolve_countries(["xx"], None).expect("second");

        assert_eq!(engine.client().requests().len(), 1);
        assert_eq!(engine.store().countries().len(), 1);
        assert_eq!(first, second);
        assert_eq!(
            second.first().and_then(|c| c.provider_id),
            Some(ProviderId(7))
        );
    }

    #[rstest]
    fn lowercase_signs_do_not_duplicate_seeded_countries(germany: MemoryStore) {
        let client = StubRemoteClient::default().with_response(
            Route::Countries,
            json!([country_prediction(5, "DE", "Germany")]),
        );
        let mut engine = engine_with(germany, client);
        let countries = engine
            .resolve_countries(["de", "DE"], None)
            .expect("resolved");

        assert!(engine.client().requests().is_empty());
        assert_eq!(countries.len(), 1);
        let stored: Vec<&str> = engine
            .store()
            .countries()
            .iter()
            .map(|country| country.sign.as_str())
            .collect();
        assert_eq!(stored, ["DE"]);
    }

    #[rstest]
    fn remote_failures_leave_local_hits(germany: MemoryStore) {
        let client = StubRemoteClient::default().with_error(
            Route::Countries,
            RemoteError::Network {
                url: "https://provider.test/countries".into(),
                message: "connection refused".into(),
            },
        );
        let mut engine = engine_with(germany, client);
        let countries = engine
            .resolve_countries(["DE", "XX"], None)
            .expect("recovered");
        assert_eq!(countries.len(), 1);
    }

    #[rstest]
    fn throttling_discards_local_hits(germany: MemoryStore) {
        let client = StubRemoteClient::default().with_error(
            Route::Countries,
            RemoteError::RateLimited {
                url: "https://provider.test/countries".into(),
            },
        );
        let mut engine = engine_with(germany, client);
        let err = engine
            .resolve_countries(["DE", "XX"], None)
            .expect_err("throttled");
        assert!(err.is_rate_limited());
        assert_eq!(engine.store().writes(), 0);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn missing_parent_signs_resolve_to_nothing(#[case] sign: Option<&str>) {
        let mut engine = engine_with(MemoryStore::default(), StubRemoteClient::default());
        let country = engine.parent_country(sign, "en").expect("no failure");
        assert!(country.is_none());
        assert!(engine.client().requests().is_empty());
    }

    #[rstest]
    fn parent_lookup_ignores_unrelated_countries() {
        let client = StubRemoteClient::default().with_response(
            Route::Countries,
            json!([country_prediction(9, "ZZ", "Zland")]),
        );
        let mut engine = engine_with(MemoryStore::default(), client);
        let country = engine.parent_country(Some("FR"), "en").expect("no failure");
        assert!(country.is_none());
    }
}
