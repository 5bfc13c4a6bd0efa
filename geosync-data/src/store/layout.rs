//! SQL derived from a field mapping.
//!
//! Statements are rendered once when the store opens and reused through
//! `prepare_cached`. Identifiers come from a validated mapping and are always
//! double-quoted.

use geosync_core::{CityUpsert, EntityKind, FieldMapping, StoreError};
use rusqlite::types::Value;

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

/// A configured table and the columns the store relies on.
#[derive(Debug, Clone)]
pub(crate) struct Backing {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    /// Column that `ON CONFLICT` upserts target; it must be unique on its own.
    pub(crate) unique_key: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct CountrySql {
    pub(crate) backing: Backing,
    pub(crate) select_by_sign: String,
    pub(crate) select_by_provider_id: String,
    pub(crate) exists: String,
    pub(crate) upsert: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RegionSql {
    pub(crate) backing: Backing,
    pub(crate) select_by_provider_id: String,
    pub(crate) exists: String,
    pub(crate) upsert: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CitySql {
    pub(crate) backing: Backing,
    pub(crate) select_by_provider_id: String,
    pub(crate) exists: String,
    pub(crate) upsert: String,
    has_latitude: bool,
    has_longitude: bool,
}

impl CitySql {
    /// Bind values in the column order of `upsert`.
    pub(crate) fn values(&self, provider_id: i64, record: &CityUpsert) -> Vec<Value> {
        let mut values = vec![Value::Integer(provider_id), Value::Text(record.name.clone())];
        if self.has_latitude {
            values.push(record.latitude.map_or(Value::Null, Value::Real));
        }
        if self.has_longitude {
            values.push(record.longitude.map_or(Value::Null, Value::Real));
        }
        values.push(Value::Integer(record.country_id.0));
        values.push(record.region_id.map_or(Value::Null, |id| Value::Integer(id.0)));
        values
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PostalCodeSql {
    pub(crate) backing: Backing,
    pub(crate) insert: String,
    pub(crate) select_by_city: String,
}

/// Rendered statements for every configured backing.
#[derive(Debug, Clone)]
pub(crate) struct TableLayout {
    country: Option<CountrySql>,
    region: Option<RegionSql>,
    city: Option<CitySql>,
    postal_code: Option<PostalCodeSql>,
}

impl TableLayout {
    pub(crate) fn from_mapping(mapping: &FieldMapping) -> Self {
        Self {
            country: mapping
                .backing(EntityKind::Country)
                .map(|table| country_sql(mapping, table)),
            region: mapping
                .backing(EntityKind::Region)
                .map(|table| region_sql(mapping, table)),
            city: mapping
                .backing(EntityKind::City)
                .map(|table| city_sql(mapping, table)),
            postal_code: mapping
                .backing(EntityKind::PostalCode)
                .map(|table| postal_code_sql(mapping, table)),
        }
    }

    pub(crate) fn backing(&self, kind: EntityKind) -> Option<&Backing> {
        match kind {
            EntityKind::Country => self.country.as_ref().map(|sql| &sql.backing),
            EntityKind::Region => self.region.as_ref().map(|sql| &sql.backing),
            EntityKind::City => self.city.as_ref().map(|sql| &sql.backing),
            EntityKind::PostalCode => self.postal_code.as_ref().map(|sql| &sql.backing),
        }
    }

    pub(crate) fn country(&self) -> Result<&CountrySql, StoreError> {
        self.country.as_ref().ok_or(StoreError::Unconfigured {
            kind: EntityKind::Country,
        })
    }

    pub(crate) fn region(&self) -> Result<&RegionSql, StoreError> {
        self.region.as_ref().ok_or(StoreError::Unconfigured {
            kind: EntityKind::Region,
        })
    }

    pub(crate) fn city(&self) -> Result<&CitySql, StoreError> {
        self.city.as_ref().ok_or(StoreError::Unconfigured {
            kind: EntityKind::City,
        })
    }

    pub(crate) fn postal_code(&self) -> Result<&PostalCodeSql, StoreError> {
        self.postal_code.as_ref().ok_or(StoreError::Unconfigured {
            kind: EntityKind::PostalCode,
        })
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn quoted_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|column| quote(column.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn exists_sql(table: &str, id: &str) -> String {
    format!("SELECT 1 FROM {} WHERE {} = ?1", quote(table), quote(id))
}

fn country_sql(mapping: &FieldMapping, table: &str) -> CountrySql {
    let fields = &mapping.country;
    let projection = quoted_list(&[
        &fields.id_field,
        &fields.provider_id_field,
        &fields.sign_field,
        &fields.name_field,
    ]);
    let select = format!("SELECT {projection} FROM {}", quote(table));
    let upsert = format!(
        "INSERT INTO {table} ({columns}) VALUES (?1, ?2, ?3) \
         ON CONFLICT({provider_id}) DO UPDATE SET {sign} = excluded.{sign}, {name} = excluded.{name} \
         RETURNING {projection}",
        table = quote(table),
        columns = quoted_list(&[&fields.provider_id_field, &fields.sign_field, &fields.name_field]),
        provider_id = quote(&fields.provider_id_field),
        sign = quote(&fields.sign_field),
        name = quote(&fields.name_field),
    );
    CountrySql {
        backing: Backing {
            table: table.to_owned(),
            columns: vec![
                fields.id_field.clone(),
                fields.provider_id_field.clone(),
                fields.sign_field.clone(),
                fields.name_field.clone(),
            ],
            unique_key: Some(fields.provider_id_field.clone()),
        },
        select_by_sign: format!(
            "{select} WHERE {} = ?1 COLLATE NOCASE ORDER BY {} LIMIT 1",
            quote(&fields.sign_field),
            quote(&fields.id_field)
        ),
        select_by_provider_id: format!("{select} WHERE {} = ?1", quote(&fields.provider_id_field)),
        exists: exists_sql(table, &fields.id_field),
        upsert,
    }
}

fn region_sql(mapping: &FieldMapping, table: &str) -> RegionSql {
    let fields = &mapping.region;
    let projection = quoted_list(&[
        &fields.id_field,
        &fields.provider_id_field,
        &fields.name_field,
        &fields.country_relation,
    ]);
    let upsert = format!(
        "INSERT INTO {table} ({columns}) VALUES (?1, ?2, ?3) \
         ON CONFLICT({provider_id}) DO UPDATE SET {name} = excluded.{name}, {country} = excluded.{country} \
         RETURNING {projection}",
        table = quote(table),
        columns = quoted_list(&[
            &fields.provider_id_field,
            &fields.name_field,
            &fields.country_relation
        ]),
        provider_id = quote(&fields.provider_id_field),
        name = quote(&fields.name_field),
        country = quote(&fields.country_relation),
    );
    RegionSql {
        backing: Backing {
            table: table.to_owned(),
            columns: vec![
                fields.id_field.clone(),
                fields.provider_id_field.clone(),
                fields.name_field.clone(),
                fields.country_relation.clone(),
            ],
            unique_key: Some(fields.provider_id_field.clone()),
        },
        select_by_provider_id: format!(
            "SELECT {projection} FROM {} WHERE {} = ?1",
            quote(table),
            quote(&fields.provider_id_field)
        ),
        exists: exists_sql(table, &fields.id_field),
        upsert,
    }
}

fn city_sql(mapping: &FieldMapping, table: &str) -> CitySql {
    let fields = &mapping.city;
    let latitude = fields.latitude();
    let longitude = fields.longitude();
    let optional = |column: Option<&str>| column.map_or_else(|| "NULL".to_owned(), quote);
    let projection = format!(
        "{}, {}, {}, {}, {}, {}, {}",
        quote(&fields.id_field),
        quote(&fields.provider_id_field),
        quote(&fields.name_field),
        optional(latitude),
        optional(longitude),
        quote(&fields.country_relation),
        quote(&fields.region_relation),
    );

    let mut columns = vec![fields.provider_id_field.as_str(), fields.name_field.as_str()];
    columns.extend(latitude);
    columns.extend(longitude);
    columns.push(&fields.country_relation);
    columns.push(&fields.region_relation);

    let mut updates: Vec<String> = [Some(fields.name_field.as_str()), latitude, longitude]
        .into_iter()
        .flatten()
        .chain([fields.country_relation.as_str()])
        .map(|column| format!("{0} = excluded.{0}", quote(column)))
        .collect();
    updates.push(format!(
        "{region} = COALESCE(excluded.{region}, {table}.{region})",
        region = quote(&fields.region_relation),
        table = quote(table),
    ));

    let upsert = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {} RETURNING {projection}",
        quote(table),
        quoted_list(&columns),
        placeholders(columns.len()),
        quote(&fields.provider_id_field),
        updates.join(", "),
    );

    let mut required: Vec<String> = vec![fields.id_field.clone()];
    required.extend(columns.iter().map(|column| (*column).to_owned()));
    CitySql {
        backing: Backing {
            table: table.to_owned(),
            columns: required,
            unique_key: Some(fields.provider_id_field.clone()),
        },
        select_by_provider_id: format!(
            "SELECT {projection} FROM {} WHERE {} = ?1",
            quote(table),
            quote(&fields.provider_id_field)
        ),
        exists: exists_sql(table, &fields.id_field),
        upsert,
        has_latitude: latitude.is_some(),
        has_longitude: longitude.is_some(),
    }
}

fn postal_code_sql(mapping: &FieldMapping, table: &str) -> PostalCodeSql {
    let fields = &mapping.postal_code;
    let all = [
        fields.id_field.as_str(),
        fields.code_field.as_str(),
        fields.slug_field.as_str(),
        fields.external_id_field.as_str(),
        fields.city_relation.as_str(),
    ];
    let projection = quoted_list(&all);
    PostalCodeSql {
        backing: Backing {
            table: table.to_owned(),
            columns: all.iter().map(|column| (*column).to_owned()).collect(),
            unique_key: None,
        },
        insert: format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4) RETURNING {projection}",
            quote(table),
            quoted_list(&[
                &fields.code_field,
                &fields.slug_field,
                &fields.external_id_field,
                &fields.city_relation
            ]),
        ),
        select_by_city: format!(
            "SELECT {projection} FROM {} WHERE {} = ?1 ORDER BY {}",
            quote(table),
            quote(&fields.city_relation),
            quote(&fields.id_field)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosync_core::RecordId;
    use rstest::rstest;

    #[rstest]
    fn country_upserts_conflict_on_the_provider_id() {
        let layout = TableLayout::from_mapping(&FieldMapping::default());
        let sql = layout.country().expect("configured");
        assert!(sql.upsert.contains("ON CONFLICT(\"provider_id\")"));
        assert!(sql.upsert.contains("RETURNING \"id\", \"provider_id\", \"sign\", \"name\""));
    }

    #[rstest]
    fn sign_lookups_ignore_case() {
        let layout = TableLayout::from_mapping(&FieldMapping::default());
        let sql = layout.country().expect("configured");
        assert!(sql.select_by_sign.contains("\"sign\" = ?1 COLLATE NOCASE"));
    }

    #[rstest]
    fn provider_ids_are_the_unique_key_of_deduplicated_kinds() {
        let layout = TableLayout::from_mapping(&FieldMapping::default());
        for kind in [EntityKind::Country, EntityKind::Region, EntityKind::City] {
            let backing = layout.backing(kind).expect("configured");
            assert_eq!(backing.unique_key.as_deref(), Some("provider_id"));
        }
        let postal = layout.backing(EntityKind::PostalCode).expect("configured");
        assert!(postal.unique_key.is_none());
    }

    #[rstest]
    fn city_upserts_keep_an_existing_region() {
        let layout = TableLayout::from_mapping(&FieldMapping::default());
        let sql = layout.city().expect("configured");
        assert!(
            sql.upsert
                .contains("\"region_id\" = COALESCE(excluded.\"region_id\", \"cities\".\"region_id\")")
        );
    }

    #[rstest]
    fn unmapped_coordinates_are_neither_written_nor_read() {
        let mut mapping = FieldMapping::default();
        mapping.city.latitude_field = None;
        mapping.city.longitude_field = Some(String::new());
        let layout = TableLayout::from_mapping(&mapping);
        let sql = layout.city().expect("configured");
        assert!(!sql.upsert.contains("latitude"));
        assert!(sql.select_by_provider_id.contains("NULL, NULL"));

        let values = sql.values(
            5,
            &CityUpsert {
                provider_id: geosync_core::ProviderId(5),
                name: "Berlin".into(),
                latitude: Some(52.5),
                longitude: Some(13.4),
                country_id: RecordId(1),
                region_id: None,
            },
        );
        assert_eq!(values.len(), 4);
    }

    #[rstest]
    fn unconfigured_kinds_report_their_kind() {
        let mut mapping = FieldMapping::default();
        mapping.region.backing = None;
        let layout = TableLayout::from_mapping(&mapping);
        assert!(layout.backing(EntityKind::Region).is_none());
        assert!(matches!(
            layout.region(),
            Err(StoreError::Unconfigured {
                kind: EntityKind::Region
            })
        ));
    }
}
