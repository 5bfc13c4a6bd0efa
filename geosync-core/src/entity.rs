//! Reference entities and the payloads used to write them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable numeric identifier assigned by the reference-data provider.
///
/// Provider ids deduplicate countries, regions and cities: a store holds at
/// most one record per provider id and entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned surrogate key of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four kinds of reference records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A country, addressable by sign and provider id.
    Country,
    /// A region (the provider calls these areas).
    Region,
    /// A city or town.
    City,
    /// A postal code attached to a city.
    PostalCode,
}

impl EntityKind {
    /// Every kind, parents before children.
    pub const ALL: [Self; 4] = [Self::Country, Self::Region, Self::City, Self::PostalCode];

    /// Lowercase label used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Region => "region",
            Self::City => "city",
            Self::PostalCode => "postal code",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted country.
///
/// Countries seeded outside the engine may lack a provider id; they remain
/// addressable by sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Store key.
    pub id: RecordId,
    /// Provider id, if the country was ever resolved remotely.
    pub provider_id: Option<ProviderId>,
    /// Short sign such as `"DE"`.
    pub sign: String,
    /// Display name.
    pub name: String,
}

/// A persisted region belonging to one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Store key.
    pub id: RecordId,
    /// Provider id.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
    /// Owning country.
    pub country_id: RecordId,
}

/// A persisted city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// Store key.
    pub id: RecordId,
    /// Provider id.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
    /// Latitude in degrees, when the deployment stores coordinates.
    pub latitude: Option<f64>,
    /// Longitude in degrees, when the deployment stores coordinates.
    pub longitude: Option<f64>,
    /// Owning country.
    pub country_id: RecordId,
    /// Owning region, when one resolved.
    pub region_id: Option<RecordId>,
}

/// A persisted postal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalCode {
    /// Store key.
    pub id: RecordId,
    /// Code as returned by the provider.
    pub code: String,
    /// URL-safe form of the code.
    pub slug: String,
    /// Generated placeholder identifier; unique per inserted row.
    pub external_id: String,
    /// Owning city.
    pub city_id: RecordId,
}

/// Field values written when a country is resolved remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryUpsert {
    /// Deduplication key.
    pub provider_id: ProviderId,
    /// Short sign.
    pub sign: String,
    /// Display name.
    pub name: String,
}

/// Field values written when a region is resolved remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionUpsert {
    /// Deduplication key.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
    /// Resolved parent country.
    pub country_id: RecordId,
}

/// Field values written when a city is resolved remotely.
///
/// `region_id` of `None` leaves an existing region link untouched. The
/// coordinates are written as given; the engine only fills them for fields the
/// deployment configures.
#[derive(Debug, Clone, PartialEq)]
pub struct CityUpsert {
    /// Deduplication key.
    pub provider_id: ProviderId,
    /// Display name.
    pub name: String,
    /// Latitude to store.
    pub latitude: Option<f64>,
    /// Longitude to store.
    pub longitude: Option<f64>,
    /// Resolved parent country.
    pub country_id: RecordId,
    /// Resolved parent region, if any.
    pub region_id: Option<RecordId>,
}

/// Field values for a freshly inserted postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostalCode {
    /// Code as returned by the provider.
    pub code: String,
    /// URL-safe form of the code.
    pub slug: String,
    /// Placeholder unique identifier.
    pub external_id: String,
    /// Owning city.
    pub city_id: RecordId,
}
