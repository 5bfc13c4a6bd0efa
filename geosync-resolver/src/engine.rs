//! The engine shared by the country, region and city resolvers.

use geosync_core::{EntityKind, FieldMapping, ReferenceStore, RemoteClient, Route};
use serde::de::DeserializeOwned;

use crate::error::ResolveError;
use crate::prediction::decode_predictions;

/// Language sent to the provider when a caller does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Tunables for [`ResolutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Language used when a resolution call passes `None`.
    pub default_language: String,
    /// Whether city latitudes are written to the store.
    pub store_latitude: bool,
    /// Whether city longitudes are written to the store.
    pub store_longitude: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_owned(),
            store_latitude: true,
            store_longitude: true,
        }
    }
}

impl EngineOptions {
    /// Derive coordinate handling from the city columns of `mapping`.
    ///
    /// A coordinate is only stored when the mapping names a column for it.
    ///
    /// # Examples
    /// ```rust
    /// use geosync_core::FieldMapping;
    /// use geosync_resolver::EngineOptions;
    ///
    /// let mut mapping = FieldMapping::default();
    /// mapping.city.longitude_field = None;
    /// let options = EngineOptions::from_mapping(&mapping);
    /// assert!(options.store_latitude);
    /// assert!(!options.store_longitude);
    /// ```
    #[must_use]
    pub fn from_mapping(mapping: &FieldMapping) -> Self {
        Self {
            store_latitude: mapping.city.latitude().is_some(),
            store_longitude: mapping.city.longitude().is_some(),
            ..Self::default()
        }
    }

    /// Replace the default language.
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }
}

/// Serves reference records from a store, falling back to a remote provider.
///
/// The engine is synchronous and call-scoped: every public resolution method
/// issues at most one request of its own (parent lookups may add more) and
/// never retries. Backings are checked on the first call rather than at
/// construction, so building an engine never touches the store.
///
/// # Examples
/// ```rust
/// use geosync_core::test_support::{MemoryStore, StubRemoteClient};
/// use geosync_resolver::ResolutionEngine;
///
/// let store = MemoryStore::with_country("DE", "Germany");
/// let mut engine = ResolutionEngine::new(store, StubRemoteClient::default());
/// let countries = engine.resolve_countries(["DE"], None).unwrap();
/// assert_eq!(countries.len(), 1);
/// assert!(engine.client().requests().is_empty());
/// ```
#[derive(Debug)]
pub struct ResolutionEngine<S, C>
where
    S: ReferenceStore,
    C: RemoteClient,
{
    pub(crate) store: S,
    pub(crate) client: C,
    pub(crate) options: EngineOptions,
    backings_checked: bool,
}

impl<S, C> ResolutionEngine<S, C>
where
    S: ReferenceStore,
    C: RemoteClient,
{
    /// Construct an engine using default options.
    #[must_use]
    pub fn new(store: S, client: C) -> Self {
        Self::with_options(store, client, EngineOptions::default())
    }

    /// Construct an engine with explicit options.
    #[must_use]
    pub const fn with_options(store: S, client: C, options: EngineOptions) -> Self {
        Self {
            store,
            client,
            options,
            backings_checked: false,
        }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The remote client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// The options in effect.
    #[must_use]
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Release the store and client.
    #[must_use]
    pub fn into_parts(self) -> (S, C) {
        (self.store, self.client)
    }

    /// Check every backing once per engine.
    ///
    /// The flag is only set after all kinds pass, so a failed check is
    /// repeated on the next call.
    pub(crate) fn ensure_backings(&mut self) -> Result<(), ResolveError> {
        if self.backings_checked {
            return Ok(());
        }
        for kind in EntityKind::ALL {
            self.store.check_backing(kind)?;
        }
        self.backings_checked = true;
        Ok(())
    }

    pub(crate) fn language(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|language| !language.is_empty())
            .unwrap_or(self.options.default_language.as_str())
            .to_owned()
    }

    /// Issue one request and decode its predictions.
    ///
    /// Throttling fails the call. Every other remote failure is logged and
    /// reported as an empty prediction list.
    pub(crate) fn fetch<T: DeserializeOwned>(
        &self,
        route: Route,
        params: &[(&'static str, String)],
    ) -> Result<Vec<T>, ResolveError> {
        let described = describe_params(params);
        log::info!("requesting {route} ({described})");
        match self.client.request(route, params) {
            Ok(body) => Ok(decode_predictions(route, body)),
            Err(source) if source.is_rate_limited() => {
                log::warn!("provider rate limited {route} ({described})");
                Err(ResolveError::RateLimited { route, source })
            }
            Err(err) => {
                log::error!("{route} request failed ({described}): {err}");
                Ok(Vec::new())
            }
        }
    }
}

fn describe_params(params: &[(&'static str, String)]) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosync_core::test_support::{MemoryStore, StubRemoteClient};
    use geosync_core::{RemoteError, StoreError};
    use rstest::rstest;
    use serde_json::json;

    use crate::prediction::CountryPrediction;

    #[rstest]
    fn missing_backing_is_a_configuration_error() {
        let store = MemoryStore::default().without_backing(EntityKind::City);
        let mut engine = ResolutionEngine::new(store, StubRemoteClient::default());
        let err = engine
            .resolve_countries(["DE"], None)
            .expect_err("city backing is missing");
        assert!(matches!(
            err,
            ResolveError::Configuration {
                source: StoreError::Unconfigured {
                    kind: EntityKind::City
                }
            }
        ));
        assert!(engine.client().requests().is_empty());
    }

    #[rstest]
    #[case(None, "en")]
    #[case(Some("uk"), "uk")]
    #[case(Some("  "), "en")]
    fn language_falls_back_to_the_default(
        #[case] requested: Option<&str>,
        #[case] expected: &str,
    ) {
        let engine = ResolutionEngine::new(MemoryStore::default(), StubRemoteClient::default());
        assert_eq!(engine.language(requested), expected);
    }

    #[rstest]
    fn fetch_maps_throttling_to_rate_limited() {
        let client = StubRemoteClient::default().with_error(
            Route::Countries,
            RemoteError::RateLimited {
                url: "https://provider.test/countries".into(),
            },
        );
        let engine = ResolutionEngine::new(MemoryStore::default(), client);
        let err = engine
            .fetch::<CountryPrediction>(Route::Countries, &[("signs", "XX".into())])
            .expect_err("throttled");
        assert!(err.is_rate_limited());
    }

    #[rstest]
    fn fetch_recovers_from_other_remote_failures() {
        let client = StubRemoteClient::default().with_error(
            Route::Areas,
            RemoteError::Http {
                url: "https://provider.test/areas".into(),
                status: 500,
                message: "boom".into(),
            },
        );
        let engine = ResolutionEngine::new(MemoryStore::default(), client);
        let predictions = engine
            .fetch::<CountryPrediction>(Route::Areas, &[("ids", "1".into())])
            .expect("recovered");
        assert!(predictions.is_empty());
    }

    #[rstest]
    fn fetch_decodes_scripted_bodies() {
        let client = StubRemoteClient::default().with_response(
            Route::Countries,
            json!([{ "id": 7, "sign": "XX", "name": "Xland" }]),
        );
        let engine = ResolutionEngine::new(MemoryStore::default(), client);
        let predictions = engine
            .fetch::<CountryPrediction>(Route::Countries, &[])
            .expect("decoded");
        assert_eq!(predictions.len(), 1);
    }

    #[rstest]
    fn params_are_described_in_order() {
        let described = describe_params(&[("signs", "DE,XX".into()), ("language", "en".into())]);
        assert_eq!(described, "signs=DE,XX, language=en");
    }
}
