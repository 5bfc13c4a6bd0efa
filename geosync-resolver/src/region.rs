//! Region resolution. Regions are always fetched: provider ids are the only
//! input and the provider is the authority for their names.

use std::collections::HashSet;

use geosync_core::{ProviderId, ReferenceStore, Region, RegionUpsert, RemoteClient, Route};

use crate::engine::ResolutionEngine;
use crate::error::ResolveError;
use crate::prediction::RegionPrediction;

impl<S, C> ResolutionEngine<S, C>
where
    S: ReferenceStore,
    C: RemoteClient,
{
    /// Resolve regions by provider id.
    ///
    /// Issues exactly one `areas` request for a non-empty id set. Each
    /// returned region is linked to the country named by its sign, which is
    /// resolved through [`ResolutionEngine::resolve_countries`]; regions whose
    /// country does not resolve are dropped. Results follow response order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::RateLimited`] when the provider throttles the
    /// regions or any parent-country request, and store failures as
    /// [`ResolveError::Configuration`] or [`ResolveError::Store`].
    pub fn resolve_regions<I>(
        &mut self,
        provider_ids: I,
        language: Option<&str>,
    ) -> Result<Vec<Region>, ResolveError>
    where
        I: IntoIterator<Item = ProviderId>,
    {
        self.ensure_backings()?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = provider_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|id| id.to_string())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let language_code = self.language(language);
        let params = vec![("ids", ids.join(",")), ("language", language_code.clone())];
        let predictions: Vec<RegionPrediction> = self.fetch(Route::Areas, &params)?;

        let mut regions = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            if let Some(region) = self.materialise_region(prediction, &language_code)? {
                regions.push(region);
            }
        }
        Ok(regions)
    }

    fn materialise_region(
        &mut self,
        prediction: RegionPrediction,
        language: &str,
    ) -> Result<Option<Region>, ResolveError> {
        let Some(country) = self.parent_country(prediction.country_sign.as_deref(), language)?
        else {
            log::debug!(
                "dropping region {} ({}): country {:?} did not resolve",
                prediction.id,
                prediction.name,
                prediction.country_sign
            );
            return Ok(None);
        };
        let region = self.store.upsert_region(&RegionUpsert {
            provider_id: prediction.id,
            name: prediction.name,
            country_id: country.id,
        })?;
        Ok(Some(region))
    }

    /// Best-effort lookup of one region for a city prediction.
    pub(crate) fn region_for_city(
        &mut self,
        area_id: ProviderId,
        language: &str,
    ) -> Result<Option<Region>, ResolveError> {
        let regions = self.resolve_regions([area_id], Some(language))?;
        Ok(regions
            .into_iter()
            .find(|region| region.provider_id == area_id))
    }
}
