//! Test-only builders for provider responses.
//!
//! The helpers in this module are available to unit tests and behavioural
//! tests. They are gated behind the `test-support` feature (and `cfg(test)`).

use serde_json::{Map, Value, json};

/// One entry of a `countries` response.
///
/// # Examples
/// ```rust
/// use geosync_resolver::test_support::country_prediction;
///
/// let body = country_prediction(7, "XX", "Xland");
/// assert_eq!(body["sign"], "XX");
/// ```
#[must_use]
pub fn country_prediction(id: u64, sign: &str, name: &str) -> Value {
    json!({ "id": id, "sign": sign, "name": name })
}

/// One entry of an `areas` response.
#[must_use]
pub fn region_prediction(id: u64, name: &str, country_sign: &str) -> Value {
    json!({ "id": id, "name": name, "countrySign": country_sign })
}

/// Builder for one entry of a `towns` response.
///
/// Optional fields are omitted from the JSON unless set.
///
/// # Examples
/// ```rust
/// use geosync_resolver::test_support::CityPredictionBuilder;
///
/// let body = CityPredictionBuilder::new(11, "Berlin", "DE")
///     .area(3)
///     .postcodes(&["10115"])
///     .build();
/// assert_eq!(body["areaId"], 3);
/// assert!(body.get("lat").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CityPredictionBuilder {
    fields: Map<String, Value>,
}

impl CityPredictionBuilder {
    /// Start a prediction with the mandatory fields.
    #[must_use]
    pub fn new(id: u64, name: &str, country_sign: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_owned(), json!(id));
        fields.insert("name".to_owned(), json!(name));
        fields.insert("countrySign".to_owned(), json!(country_sign));
        Self { fields }
    }

    /// Set `areaId`.
    #[must_use]
    pub fn area(mut self, area_id: u64) -> Self {
        self.fields.insert("areaId".to_owned(), json!(area_id));
        self
    }

    /// Set `lat` and `lon`.
    #[must_use]
    pub fn coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.fields.insert("lat".to_owned(), json!(lat));
        self.fields.insert("lon".to_owned(), json!(lon));
        self
    }

    /// Set `postcode`.
    #[must_use]
    pub fn postcodes(mut self, codes: &[&str]) -> Self {
        self.fields.insert("postcode".to_owned(), json!(codes));
        self
    }

    /// Produce the JSON object.
    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}
