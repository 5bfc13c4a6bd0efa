#![forbid(unsafe_code)]

use geosync_core::{EntityKind, FieldMapping};
use rusqlite::{Connection, Error as SqliteError, Transaction};
use thiserror::Error;

use super::layout::quote;

/// Create the tables configured by `mapping` inside an existing database.
///
/// The function enables foreign keys and creates every configured backing
/// with a UNIQUE provider-id column, plus lookup indexes for country signs
/// and postal-code city links. Statements use `IF NOT EXISTS`, so running it
/// against an initialised database is a no-op. Parent references are only
/// declared when the parent kind is configured too.
///
/// # Examples
/// ```
/// use geosync_core::FieldMapping;
/// use geosync_data::store::initialise_schema;
/// use rusqlite::Connection;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn, &FieldMapping::default()).expect("create schema");
///
/// let tables: i64 = conn
///     .query_row(
///         "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
///         [],
///         |row| row.get(0),
///     )
///     .expect("count tables");
/// assert_eq!(tables, 4);
/// ```
pub fn initialise_schema(
    connection: &mut Connection,
    mapping: &FieldMapping,
) -> Result<(), SchemaError> {
    mapping.validate().map_err(SchemaError::Mapping)?;
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| SchemaError::ForeignKeys { source })?;

    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_countries(&transaction, mapping)?;
    create_regions(&transaction, mapping)?;
    create_cities(&transaction, mapping)?;
    create_postal_codes(&transaction, mapping)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })?;

    Ok(())
}

fn create_countries(
    transaction: &Transaction<'_>,
    mapping: &FieldMapping,
) -> Result<(), SchemaError> {
    let Some(table) = mapping.backing(EntityKind::Country) else {
        return Ok(());
    };
    let fields = &mapping.country;
    run_migration_step(
        transaction,
        "create country table",
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                {} INTEGER PRIMARY KEY,
                {} INTEGER UNIQUE,
                {} TEXT NOT NULL CHECK (length(trim({sign})) > 0),
                {} TEXT NOT NULL
            )",
            quote(table),
            quote(&fields.id_field),
            quote(&fields.provider_id_field),
            quote(&fields.sign_field),
            quote(&fields.name_field),
            sign = quote(&fields.sign_field),
        ),
    )?;
    run_migration_step(
        transaction,
        "index country signs",
        &format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({} COLLATE NOCASE)",
            quote(&format!("idx_{table}_{}", fields.sign_field)),
            quote(table),
            quote(&fields.sign_field),
        ),
    )
}

fn create_regions(
    transaction: &Transaction<'_>,
    mapping: &FieldMapping,
) -> Result<(), SchemaError> {
    let Some(table) = mapping.backing(EntityKind::Region) else {
        return Ok(());
    };
    let fields = &mapping.region;
    run_migration_step(
        transaction,
        "create region table",
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                {} INTEGER PRIMARY KEY,
                {} INTEGER NOT NULL UNIQUE,
                {} TEXT NOT NULL,
                {} INTEGER NOT NULL{}
            )",
            quote(table),
            quote(&fields.id_field),
            quote(&fields.provider_id_field),
            quote(&fields.name_field),
            quote(&fields.country_relation),
            references(mapping, EntityKind::Country),
        ),
    )
}

fn create_cities(transaction: &Transaction<'_>, mapping: &FieldMapping) -> Result<(), SchemaError> {
    let Some(table) = mapping.backing(EntityKind::City) else {
        return Ok(());
    };
    let fields = &mapping.city;
    let coordinates: String = [fields.latitude(), fields.longitude()]
        .into_iter()
        .flatten()
        .map(|column| format!("{} REAL,\n", quote(column)))
        .collect();
    run_migration_step(
        transaction,
        "create city table",
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                {} INTEGER PRIMARY KEY,
                {} INTEGER NOT NULL UNIQUE,
                {} TEXT NOT NULL,
                {coordinates}
                {} INTEGER NOT NULL{},
                {} INTEGER{}
            )",
            quote(table),
            quote(&fields.id_field),
            quote(&fields.provider_id_field),
            quote(&fields.name_field),
            quote(&fields.country_relation),
            references(mapping, EntityKind::Country),
            quote(&fields.region_relation),
            references(mapping, EntityKind::Region),
        ),
    )
}

fn create_postal_codes(
    transaction: &Transaction<'_>,
    mapping: &FieldMapping,
) -> Result<(), SchemaError> {
    let Some(table) = mapping.backing(EntityKind::PostalCode) else {
        return Ok(());
    };
    let fields = &mapping.postal_code;
    run_migration_step(
        transaction,
        "create postal code table",
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                {} INTEGER PRIMARY KEY,
                {} TEXT NOT NULL,
                {} TEXT NOT NULL,
                {} TEXT NOT NULL UNIQUE,
                {} INTEGER NOT NULL{}
            )",
            quote(table),
            quote(&fields.id_field),
            quote(&fields.code_field),
            quote(&fields.slug_field),
            quote(&fields.external_id_field),
            quote(&fields.city_relation),
            references(mapping, EntityKind::City),
        ),
    )?;
    run_migration_step(
        transaction,
        "index postal code cities",
        &format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            quote(&format!("idx_{table}_{}", fields.city_relation)),
            quote(table),
            quote(&fields.city_relation),
        ),
    )
}

/// `REFERENCES` clause pointing at the backing of `parent`, if configured.
fn references(mapping: &FieldMapping, parent: EntityKind) -> String {
    let id_field = match parent {
        EntityKind::Country => &mapping.country.id_field,
        EntityKind::Region => &mapping.region.id_field,
        EntityKind::City => &mapping.city.id_field,
        EntityKind::PostalCode => &mapping.postal_code.id_field,
    };
    mapping.backing(parent).map_or_else(String::new, |table| {
        format!(" REFERENCES {}({})", quote(table), quote(id_field))
    })
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the reference schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid field mapping: {0}")]
    Mapping(#[source] geosync_core::MappingError),
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        #[source]
        source: SqliteError,
    },
    #[error("failed to execute migration step '{step}'")]
    Migration {
        step: &'static str,
        #[source]
        source: SqliteError,
    },
}
