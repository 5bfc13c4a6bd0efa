//! City autocomplete and postal-code materialisation.

use geosync_core::{
    City, CityUpsert, NewPostalCode, ReferenceStore, RemoteClient, Route, slugify,
};
use uuid::Uuid;

use crate::engine::ResolutionEngine;
use crate::error::ResolveError;
use crate::prediction::CityPrediction;

/// Result count requested when the caller does not choose one.
pub const DEFAULT_CITY_LIMIT: u32 = 10;

/// Whether `query` is answered by the postcode endpoint.
///
/// A query qualifies when, after trimming, it is non-empty and made only of
/// ASCII digits.
///
/// # Examples
/// ```rust
/// use geosync_resolver::is_postcode_query;
///
/// assert!(is_postcode_query(" 12345 "));
/// assert!(!is_postcode_query("Berlin"));
/// assert!(!is_postcode_query("10-115"));
/// ```
#[must_use]
pub fn is_postcode_query(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit())
}

impl<S, C> ResolutionEngine<S, C>
where
    S: ReferenceStore,
    C: RemoteClient,
{
    /// Resolve cities matching a free-text or postcode query.
    ///
    /// Numeric queries go to `towns/by/postcode`, everything else to
    /// `towns`. Each prediction is materialised in order:
    /// 1. its country is resolved by sign, and the prediction is dropped
    ///    when none resolves;
    /// 2. its region is resolved from `areaId` when present, best effort;
    /// 3. the city is upserted on its provider id, writing coordinates only
    ///    when [`EngineOptions`](crate::EngineOptions) allows it;
    /// 4. one postal code is inserted per entry of `postcode`.
    ///
    /// A blank query returns nothing without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RateLimited`] when the provider throttles the
    /// search or any parent lookup, and store failures as
    /// [`ResolveError::Configuration`] or [`ResolveError::Store`].
    pub fn autocomplete_city(
        &mut self,
        query: &str,
        limit: u32,
        language: Option<&str>,
    ) -> Result<Vec<City>, ResolveError> {
        self.ensure_backings()?;

        let trimmed = query.trim();
        if trimmed.is_empty() {
            log::debug!("ignoring blank city query");
            return Ok(Vec::new());
        }
        let route = if is_postcode_query(trimmed) {
            Route::TownsByPostcode
        } else {
            Route::Towns
        };
        let language_code = self.language(language);
        let params = vec![
            ("query", trimmed.to_owned()),
            ("queryLimit", limit.to_string()),
            ("language", language_code.clone()),
        ];
        let predictions: Vec<CityPrediction> = self.fetch(route, &params)?;

        let mut cities = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            if let Some(city) = self.materialise_city(prediction, &language_code)? {
                cities.push(city);
            }
        }
        Ok(cities)
    }

    fn materialise_city(
        &mut self,
        prediction: CityPrediction,
        language: &str,
    ) -> Result<Option<City>, ResolveError> {
        let Some(country) = self.parent_country(prediction.country_sign.as_deref(), language)?
        else {
            log::debug!(
                "dropping city {} ({}): country {:?} did not resolve",
                prediction.id,
                prediction.name,
                prediction.country_sign
            );
            return Ok(None);
        };
        let region = match prediction.area_id {
            Some(area_id) => self.region_for_city(area_id, language)?,
            None => None,
        };
        if region.is_none() {
            log::debug!("city {} stored without a region link", prediction.id);
        }

        let city = self.store.upsert_city(&CityUpsert {
            provider_id: prediction.id,
            name: prediction.name,
            latitude: prediction.lat.filter(|_| self.options.store_latitude),
            longitude: prediction.lon.filter(|_| self.options.store_longitude),
            country_id: country.id,
            region_id: region.map(|stored| stored.id),
        })?;

        for code in prediction.postcode.unwrap_or_default() {
            self.store.insert_postal_code(&NewPostalCode {
                slug: slugify(&code),
                code,
                external_id: Uuid::new_v4().to_string(),
                city_id: city.id,
            })?;
        }
        Ok(Some(city))
    }
}
