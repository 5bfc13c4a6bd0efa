#![forbid(unsafe_code)]

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use geosync_core::{
    City, CityUpsert, Country, CountryUpsert, EntityKind, FieldMapping, MappingError,
    NewPostalCode, PostalCode, ProviderId, RecordId, ReferenceStore, Region, RegionUpsert,
    StoreError,
};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use thiserror::Error;

use super::layout::{TableLayout, quote};
use super::schema::{SchemaError, initialise_schema};
use crate::fs::ensure_parent_dir;

/// Errors raised while opening a [`SqliteReferenceStore`].
#[derive(Debug, Error)]
pub enum StoreOpenError {
    #[error("invalid field mapping: {0}")]
    Mapping(#[source] MappingError),
    #[error("failed to create the directory for {path}")]
    Directory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to {operation}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// [`ReferenceStore`] over a SQLite database laid out by a [`FieldMapping`].
///
/// Upserts are single `INSERT … ON CONFLICT(provider_id) DO UPDATE …
/// RETURNING` statements, so concurrent writers sharing the database never
/// create two rows for one provider id. A refreshed city keeps its previous
/// region link when the new record carries none.
///
/// # Examples
/// ```
/// use geosync_core::{CountryUpsert, FieldMapping, ProviderId, ReferenceStore};
/// use geosync_data::store::SqliteReferenceStore;
///
/// let mut store = SqliteReferenceStore::open_in_memory(FieldMapping::default())?;
/// store.initialise_schema()?;
/// let record = CountryUpsert {
///     provider_id: ProviderId(7),
///     sign: "XX".into(),
///     name: "Xland".into(),
/// };
/// let first = store.upsert_country(&record)?;
/// let second = store.upsert_country(&record)?;
/// assert_eq!(first.id, second.id);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SqliteReferenceStore {
    connection: Connection,
    mapping: FieldMapping,
    layout: TableLayout,
}

impl SqliteReferenceStore {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// Tables are not created; call [`Self::initialise_schema`] or point the
    /// mapping at existing tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping is invalid, the directory cannot be
    /// created or SQLite fails to open the file.
    pub fn open(path: &Utf8Path, mapping: FieldMapping) -> Result<Self, StoreOpenError> {
        mapping.validate().map_err(StoreOpenError::Mapping)?;
        ensure_parent_dir(path).map_err(|source| StoreOpenError::Directory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| StoreOpenError::Sqlite {
                operation: "open database",
                source,
            })?;
        Self::from_connection(connection, mapping)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping is invalid or SQLite fails to open.
    pub fn open_in_memory(mapping: FieldMapping) -> Result<Self, StoreOpenError> {
        mapping.validate().map_err(StoreOpenError::Mapping)?;
        let connection = Connection::open_in_memory().map_err(|source| StoreOpenError::Sqlite {
            operation: "open in-memory database",
            source,
        })?;
        Self::from_connection(connection, mapping)
    }

    fn from_connection(connection: Connection, mapping: FieldMapping) -> Result<Self, StoreOpenError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| StoreOpenError::Sqlite {
                operation: "enable foreign keys",
                source,
            })?;
        let layout = TableLayout::from_mapping(&mapping);
        Ok(Self {
            connection,
            mapping,
            layout,
        })
    }

    /// Create the configured tables if they are missing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a statement fails.
    pub fn initialise_schema(&mut self) -> Result<(), SchemaError> {
        initialise_schema(&mut self.connection, &self.mapping)
    }

    /// The mapping the store was opened with.
    #[must_use]
    pub const fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    fn row_exists(&self, sql: &str, id: RecordId) -> Result<bool, StoreError> {
        self.connection
            .prepare_cached(sql)
            .and_then(|mut statement| statement.exists([id.0]))
            .map_err(|err| StoreError::backend("check parent record", err))
    }

    fn ensure_parent(&self, kind: EntityKind, sql: &str, id: RecordId) -> Result<(), StoreError> {
        if self.row_exists(sql, id)? {
            Ok(())
        } else {
            Err(StoreError::MissingParent { kind, id })
        }
    }

    /// Whether `column` alone is the primary key or a full unique index of
    /// `table`, which is what `ON CONFLICT(column)` requires.
    fn has_unique_key(
        &self,
        table: &str,
        column: &str,
        primary_key: &[&str],
    ) -> Result<bool, StoreError> {
        if matches!(primary_key, [only] if *only == column) {
            return Ok(true);
        }
        let indexes: Vec<String> = self
            .connection
            .prepare(&format!("PRAGMA index_list({})", quote(table)))
            .and_then(|mut statement| {
                let rows = statement.query_map([], |row| {
                    Ok((
                        row.get::<_, String>("name")?,
                        row.get::<_, bool>("unique")?,
                        row.get::<_, bool>("partial")?,
                    ))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|err| StoreError::backend("list backing indexes", err))?
            .into_iter()
            .filter(|(_, unique, partial)| *unique && !*partial)
            .map(|(name, ..)| name)
            .collect();
        for index in indexes {
            let indexed: Vec<Option<String>> = self
                .connection
                .prepare(&format!("PRAGMA index_info({})", quote(&index)))
                .and_then(|mut statement| {
                    let names = statement.query_map([], |row| row.get("name"))?;
                    names.collect()
                })
                .map_err(|err| StoreError::backend("read backing index columns", err))?;
            if let [Some(name)] = indexed.as_slice()
                && name == column
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn query_optional<T>(
        &self,
        operation: &'static str,
        sql: &str,
        key: impl rusqlite::ToSql,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, StoreError> {
        self.connection
            .prepare_cached(sql)
            .and_then(|mut statement| statement.query_row([key], map).optional())
            .map_err(|err| StoreError::backend(operation, err))
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn check_backing(&self, kind: EntityKind) -> Result<(), StoreError> {
        let backing = self
            .layout
            .backing(kind)
            .ok_or(StoreError::Unconfigured { kind })?;

        let present: bool = self
            .connection
            .prepare_cached(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            )
            .and_then(|mut statement| statement.exists([&backing.table]))
            .map_err(|err| StoreError::backend("look up backing table", err))?;
        if !present {
            return Err(StoreError::MissingBacking {
                kind,
                backing: backing.table.clone(),
            });
        }

        let table_info = self
            .connection
            .prepare(&format!("PRAGMA table_info({})", quote(&backing.table)))
            .and_then(|mut statement| {
                let rows = statement.query_map([], |row| {
                    Ok((row.get::<_, String>("name")?, row.get::<_, i64>("pk")?))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|err| StoreError::backend("read backing columns", err))?;
        let columns: HashSet<&str> = table_info.iter().map(|(name, _)| name.as_str()).collect();
        let primary_key: Vec<&str> = table_info
            .iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        if let Some(missing) = backing
            .columns
            .iter()
            .find(|column| !columns.contains(column.as_str()))
        {
            return Err(StoreError::MissingField {
                kind,
                backing: backing.table.clone(),
                field: missing.clone(),
            });
        }

        if let Some(key) = &backing.unique_key
            && !self.has_unique_key(&backing.table, key, &primary_key)?
        {
            return Err(StoreError::MissingUniqueKey {
                kind,
                backing: backing.table.clone(),
                field: key.clone(),
            });
        }
        Ok(())
    }

    fn find_country_by_sign(&self, sign: &str) -> Result<Option<Country>, StoreError> {
        let sql = self.layout.country()?;
        self.query_optional("find country by sign", &sql.select_by_sign, sign, country_from_row)
    }

    fn find_country_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Country>, StoreError> {
        let sql = self.layout.country()?;
        self.query_optional(
            "find country by provider id",
            &sql.select_by_provider_id,
            provider_key(provider_id)?,
            country_from_row,
        )
    }

    fn find_region_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Region>, StoreError> {
        let sql = self.layout.region()?;
        self.query_optional(
            "find region by provider id",
            &sql.select_by_provider_id,
            provider_key(provider_id)?,
            region_from_row,
        )
    }

    fn find_city_by_provider_id(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<City>, StoreError> {
        let sql = self.layout.city()?;
        self.query_optional(
            "find city by provider id",
            &sql.select_by_provider_id,
            provider_key(provider_id)?,
            city_from_row,
        )
    }

    fn upsert_country(&mut self, record: &CountryUpsert) -> Result<Country, StoreError> {
        let sql = self.layout.country()?;
        let provider_id = provider_key(record.provider_id)?;
        self.connection
            .prepare_cached(&sql.upsert)
            .and_then(|mut statement| {
                statement.query_row(
                    params![provider_id, record.sign, record.name],
                    country_from_row,
                )
            })
            .map_err(|err| StoreError::backend("upsert country", err))
    }

    fn upsert_region(&mut self, record: &RegionUpsert) -> Result<Region, StoreError> {
        let country_exists = &self.layout.country()?.exists;
        self.ensure_parent(EntityKind::Country, country_exists, record.country_id)?;
        let sql = self.layout.region()?;
        let provider_id = provider_key(record.provider_id)?;
        self.connection
            .prepare_cached(&sql.upsert)
            .and_then(|mut statement| {
                statement.query_row(
                    params![provider_id, record.name, record.country_id.0],
                    region_from_row,
                )
            })
            .map_err(|err| StoreError::backend("upsert region", err))
    }

    fn upsert_city(&mut self, record: &CityUpsert) -> Result<City, StoreError> {
        let country_exists = &self.layout.country()?.exists;
        self.ensure_parent(EntityKind::Country, country_exists, record.country_id)?;
        if let Some(region_id) = record.region_id {
            let region_exists = &self.layout.region()?.exists;
            self.ensure_parent(EntityKind::Region, region_exists, region_id)?;
        }
        let sql = self.layout.city()?;
        let values = sql.values(provider_key(record.provider_id)?, record);
        self.connection
            .prepare_cached(&sql.upsert)
            .and_then(|mut statement| statement.query_row(params_from_iter(values), city_from_row))
            .map_err(|err| StoreError::backend("upsert city", err))
    }

    fn insert_postal_code(&mut self, record: &NewPostalCode) -> Result<PostalCode, StoreError> {
        let city_exists = &self.layout.city()?.exists;
        self.ensure_parent(EntityKind::City, city_exists, record.city_id)?;
        let sql = self.layout.postal_code()?;
        self.connection
            .prepare_cached(&sql.insert)
            .and_then(|mut statement| {
                statement.query_row(
                    params![record.code, record.slug, record.external_id, record.city_id.0],
                    postal_code_from_row,
                )
            })
            .map_err(|err| StoreError::backend("insert postal code", err))
    }

    fn postal_codes_for_city(&self, city_id: RecordId) -> Result<Vec<PostalCode>, StoreError> {
        let sql = self.layout.postal_code()?;
        self.connection
            .prepare_cached(&sql.select_by_city)
            .and_then(|mut statement| {
                let codes = statement.query_map([city_id.0], postal_code_from_row)?;
                codes.collect()
            })
            .map_err(|err| StoreError::backend("list postal codes", err))
    }
}

fn provider_key(provider_id: ProviderId) -> Result<i64, StoreError> {
    i64::try_from(provider_id.0).map_err(|_| StoreError::ProviderIdOutOfRange { provider_id })
}

fn provider_from_column(row: &Row<'_>, index: usize) -> rusqlite::Result<ProviderId> {
    let raw: i64 = row.get(index)?;
    u64::try_from(raw)
        .map(ProviderId)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(index, raw))
}

fn country_from_row(row: &Row<'_>) -> rusqlite::Result<Country> {
    let provider_id = match row.get::<_, Option<i64>>(1)? {
        Some(_) => Some(provider_from_column(row, 1)?),
        None => None,
    };
    Ok(Country {
        id: RecordId(row.get(0)?),
        provider_id,
        sign: row.get(2)?,
        name: row.get(3)?,
    })
}

fn region_from_row(row: &Row<'_>) -> rusqlite::Result<Region> {
    Ok(Region {
        id: RecordId(row.get(0)?),
        provider_id: provider_from_column(row, 1)?,
        name: row.get(2)?,
        country_id: RecordId(row.get(3)?),
    })
}

fn city_from_row(row: &Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        id: RecordId(row.get(0)?),
        provider_id: provider_from_column(row, 1)?,
        name: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        country_id: RecordId(row.get(5)?),
        region_id: row.get::<_, Option<i64>>(6)?.map(RecordId),
    })
}

fn postal_code_from_row(row: &Row<'_>) -> rusqlite::Result<PostalCode> {
    Ok(PostalCode {
        id: RecordId(row.get(0)?),
        code: row.get(1)?,
        slug: row.get(2)?,
        external_id: row.get(3)?,
        city_id: RecordId(row.get(4)?),
    })
}
