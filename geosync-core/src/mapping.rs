//! Field mapping between reference entities and their backing tables.
//!
//! A deployment chooses, per entity kind, which backing holds the records and
//! which fields carry the name, sign, provider id, coordinates and parent
//! links. The mapping is loaded once; [`FieldMapping::validate`] rejects
//! malformed identifiers up front, while the existence of the backing itself
//! is only checked when the engine first resolves something.
//!
//! Optional settings treat an empty string the same as an absent value, so a
//! configuration file can opt out of coordinates with `"latitude_field": ""`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EntityKind;

/// Errors raised by [`FieldMapping::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A configured name is not a plain identifier.
    #[error("{kind} setting `{setting}` has invalid identifier {value:?}")]
    InvalidIdentifier {
        /// Entity kind owning the setting.
        kind: EntityKind,
        /// Setting name.
        setting: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Country backing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountryFields {
    /// Backing table; `None` leaves countries unconfigured.
    pub backing: Option<String>,
    /// Primary key column.
    pub id_field: String,
    /// Display name column.
    pub name_field: String,
    /// Short sign column.
    pub sign_field: String,
    /// Provider id column.
    pub provider_id_field: String,
}

impl Default for CountryFields {
    fn default() -> Self {
        Self {
            backing: Some("countries".to_owned()),
            id_field: "id".to_owned(),
            name_field: "name".to_owned(),
            sign_field: "sign".to_owned(),
            provider_id_field: "provider_id".to_owned(),
        }
    }
}

/// Region backing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionFields {
    /// Backing table; `None` leaves regions unconfigured.
    pub backing: Option<String>,
    /// Primary key column.
    pub id_field: String,
    /// Display name column.
    pub name_field: String,
    /// Provider id column.
    pub provider_id_field: String,
    /// Column linking to the owning country.
    pub country_relation: String,
}

impl Default for RegionFields {
    fn default() -> Self {
        Self {
            backing: Some("regions".to_owned()),
            id_field: "id".to_owned(),
            name_field: "name".to_owned(),
            provider_id_field: "provider_id".to_owned(),
            country_relation: "country_id".to_owned(),
        }
    }
}

/// City backing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CityFields {
    /// Backing table; `None` leaves cities unconfigured.
    pub backing: Option<String>,
    /// Primary key column.
    pub id_field: String,
    /// Display name column.
    pub name_field: String,
    /// Provider id column.
    pub provider_id_field: String,
    /// Latitude column; absent or empty disables storing latitudes.
    pub latitude_field: Option<String>,
    /// Longitude column; absent or empty disables storing longitudes.
    pub longitude_field: Option<String>,
    /// Column linking to the owning country.
    pub country_relation: String,
    /// Column linking to the owning region.
    pub region_relation: String,
}

impl Default for CityFields {
    fn default() -> Self {
        Self {
            backing: Some("cities".to_owned()),
            id_field: "id".to_owned(),
            name_field: "name".to_owned(),
            provider_id_field: "provider_id".to_owned(),
            latitude_field: Some("latitude".to_owned()),
            longitude_field: Some("longitude".to_owned()),
            country_relation: "country_id".to_owned(),
            region_relation: "region_id".to_owned(),
        }
    }
}

impl CityFields {
    /// Latitude column, if the deployment stores latitudes.
    #[must_use]
    pub fn latitude(&self) -> Option<&str> {
        non_empty(self.latitude_field.as_deref())
    }

    /// Longitude column, if the deployment stores longitudes.
    #[must_use]
    pub fn longitude(&self) -> Option<&str> {
        non_empty(self.longitude_field.as_deref())
    }
}

/// Postal code backing layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostalCodeFields {
    /// Backing table; `None` leaves postal codes unconfigured.
    pub backing: Option<String>,
    /// Primary key column.
    pub id_field: String,
    /// Code column.
    pub code_field: String,
    /// Slug column.
    pub slug_field: String,
    /// Placeholder external id column.
    pub external_id_field: String,
    /// Column linking to the owning city.
    pub city_relation: String,
}

impl Default for PostalCodeFields {
    fn default() -> Self {
        Self {
            backing: Some("postal_codes".to_owned()),
            id_field: "id".to_owned(),
            code_field: "code".to_owned(),
            slug_field: "slug".to_owned(),
            external_id_field: "external_id".to_owned(),
            city_relation: "city_id".to_owned(),
        }
    }
}

/// Backing layout for every entity kind.
///
/// # Examples
///
/// ```rust
/// use geosync_core::{EntityKind, FieldMapping};
///
/// let mapping: FieldMapping = serde_json::from_str(
///     r#"{ "city": { "latitude_field": "", "longitude_field": null } }"#,
/// )?;
/// mapping.validate()?;
/// assert_eq!(mapping.backing(EntityKind::City), Some("cities"));
/// assert!(mapping.city.latitude().is_none());
/// assert!(mapping.city.longitude().is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldMapping {
    /// Country layout.
    pub country: CountryFields,
    /// Region layout.
    pub region: RegionFields,
    /// City layout.
    pub city: CityFields,
    /// Postal code layout.
    pub postal_code: PostalCodeFields,
}

impl FieldMapping {
    /// Backing configured for `kind`, ignoring empty names.
    #[must_use]
    pub fn backing(&self, kind: EntityKind) -> Option<&str> {
        let configured = match kind {
            EntityKind::Country => self.country.backing.as_deref(),
            EntityKind::Region => self.region.backing.as_deref(),
            EntityKind::City => self.city.backing.as_deref(),
            EntityKind::PostalCode => self.postal_code.backing.as_deref(),
        };
        non_empty(configured)
    }

    /// Reject names that cannot be used verbatim as storage identifiers.
    pub fn validate(&self) -> Result<(), MappingError> {
        for (kind, setting, value) in self.settings() {
            if !is_identifier(value) {
                return Err(MappingError::InvalidIdentifier {
                    kind,
                    setting,
                    value: value.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn settings(&self) -> Vec<(EntityKind, &'static str, &str)> {
        use EntityKind::{City, Country, PostalCode, Region};

        let mut settings = vec![
            (Country, "id_field", self.country.id_field.as_str()),
            (Country, "name_field", self.country.name_field.as_str()),
            (Country, "sign_field", self.country.sign_field.as_str()),
            (Country, "provider_id_field", self.country.provider_id_field.as_str()),
            (Region, "id_field", self.region.id_field.as_str()),
            (Region, "name_field", self.region.name_field.as_str()),
            (Region, "provider_id_field", self.region.provider_id_field.as_str()),
            (Region, "country_relation", self.region.country_relation.as_str()),
            (City, "id_field", self.city.id_field.as_str()),
            (City, "name_field", self.city.name_field.as_str()),
            (City, "provider_id_field", self.city.provider_id_field.as_str()),
            (City, "country_relation", self.city.country_relation.as_str()),
            (City, "region_relation", self.city.region_relation.as_str()),
            (PostalCode, "id_field", self.postal_code.id_field.as_str()),
            (PostalCode, "code_field", self.postal_code.code_field.as_str()),
            (PostalCode, "slug_field", self.postal_code.slug_field.as_str()),
            (PostalCode, "external_id_field", self.postal_code.external_id_field.as_str()),
            (PostalCode, "city_relation", self.postal_code.city_relation.as_str()),
        ];
        for kind in EntityKind::ALL {
            if let Some(backing) = self.backing(kind) {
                settings.push((kind, "backing", backing));
            }
        }
        if let Some(latitude) = self.city.latitude() {
            settings.push((City, "latitude_field", latitude));
        }
        if let Some(longitude) = self.city.longitude() {
            settings.push((City, "longitude_field", longitude));
        }
        settings
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|name| !name.trim().is_empty())
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
