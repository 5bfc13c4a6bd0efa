//! Provider response records.
//!
//! Every endpoint answers with a JSON array of predictions. Items are decoded
//! one by one so a single malformed entry does not discard the rest.

use geosync_core::{ProviderId, Route};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Entry of the `countries` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct CountryPrediction {
    pub(crate) id: ProviderId,
    pub(crate) sign: String,
    pub(crate) name: String,
}

/// Entry of the `areas` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegionPrediction {
    pub(crate) id: ProviderId,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) country_sign: Option<String>,
}

/// Entry of the `towns` and `towns/by/postcode` endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CityPrediction {
    pub(crate) id: ProviderId,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) country_sign: Option<String>,
    #[serde(default)]
    pub(crate) area_id: Option<ProviderId>,
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    #[serde(default)]
    pub(crate) postcode: Option<Vec<String>>,
}

/// Decode the predictions in `body`, skipping entries that do not parse.
pub(crate) fn decode_predictions<T: DeserializeOwned>(route: Route, body: Value) -> Vec<T> {
    let Value::Array(items) = body else {
        log::error!("{route} response is not a JSON array; treating it as empty");
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(prediction) => Some(prediction),
            Err(err) => {
                log::warn!("skipping malformed {route} prediction at index {index}: {err}");
                None
            }
        })
        .collect()
}
