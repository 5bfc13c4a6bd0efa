//! Unit tests for the SQLite reference store.

use camino::Utf8PathBuf;
use geosync_core::{
    CityUpsert, CountryUpsert, EntityKind, FieldMapping, NewPostalCode, ProviderId, RecordId,
    ReferenceStore, RegionUpsert, StoreError,
};
use rstest::{fixture, rstest};
use std::sync::Barrier;
use std::thread;
use tempfile::TempDir;

use super::{SqliteReferenceStore, StoreOpenError};

#[fixture]
fn store() -> SqliteReferenceStore {
    let mut store =
        SqliteReferenceStore::open_in_memory(FieldMapping::default()).expect("open store");
    store.initialise_schema().expect("create schema");
    store
}

fn germany(store: &mut SqliteReferenceStore) -> RecordId {
    store
        .upsert_country(&CountryUpsert {
            provider_id: ProviderId(1),
            sign: "DE".into(),
            name: "Germany".into(),
        })
        .expect("insert country")
        .id
}

fn city(country_id: RecordId, region_id: Option<RecordId>) -> CityUpsert {
    CityUpsert {
        provider_id: ProviderId(11),
        name: "Berlin".into(),
        latitude: Some(52.52),
        longitude: Some(13.405),
        country_id,
        region_id,
    }
}

#[rstest]
fn initialised_schema_passes_every_backing_check(store: SqliteReferenceStore) {
    for kind in EntityKind::ALL {
        store.check_backing(kind).expect("backing present");
    }
}

#[rstest]
fn initialising_twice_is_harmless(mut store: SqliteReferenceStore) {
    store.initialise_schema().expect("second run");
}

#[rstest]
fn missing_tables_are_reported() {
    let store = SqliteReferenceStore::open_in_memory(FieldMapping::default()).expect("open store");
    let err = store
        .check_backing(EntityKind::Country)
        .expect_err("no tables yet");
    assert!(matches!(
        err,
        StoreError::MissingBacking { kind: EntityKind::Country, ref backing } if backing == "countries"
    ));
}

#[rstest]
fn missing_columns_are_reported() {
    let store = SqliteReferenceStore::open_in_memory(FieldMapping::default()).expect("open store");
    store
        .connection()
        .execute(
            "CREATE TABLE regions (id INTEGER PRIMARY KEY, provider_id INTEGER UNIQUE, name TEXT)",
            [],
        )
        .expect("create partial table");
    let err = store
        .check_backing(EntityKind::Region)
        .expect_err("country_id missing");
    assert!(matches!(
        err,
        StoreError::MissingField { ref field, .. } if field == "country_id"
    ));
    assert!(err.is_configuration());
}

#[rstest]
fn provider_ids_without_a_unique_key_are_reported() {
    let store = SqliteReferenceStore::open_in_memory(FieldMapping::default()).expect("open store");
    store
        .connection()
        .execute_batch(
            "CREATE TABLE countries (id INTEGER PRIMARY KEY, provider_id INTEGER, sign TEXT, name TEXT);
             CREATE UNIQUE INDEX partial_provider ON countries(provider_id) WHERE provider_id > 0;
             CREATE UNIQUE INDEX sign_and_provider ON countries(sign, provider_id);",
        )
        .expect("create unkeyed table");
    let err = store
        .check_backing(EntityKind::Country)
        .expect_err("provider id is not unique on its own");
    assert!(matches!(
        err,
        StoreError::MissingUniqueKey { kind: EntityKind::Country, ref field, .. }
            if field == "provider_id"
    ));
    assert!(err.is_configuration());
}

#[rstest]
#[case::unique_index("CREATE TABLE regions (id INTEGER PRIMARY KEY, provider_id INTEGER, name TEXT, country_id INTEGER);
    CREATE UNIQUE INDEX regions_provider ON regions(provider_id);")]
#[case::primary_key("CREATE TABLE regions (id INTEGER, provider_id INTEGER PRIMARY KEY, name TEXT, country_id INTEGER);")]
fn existing_tables_may_key_provider_ids_their_own_way(#[case] ddl: &str) {
    let store = SqliteReferenceStore::open_in_memory(FieldMapping::default()).expect("open store");
    store.connection().execute_batch(ddl).expect("create table");
    store
        .check_backing(EntityKind::Region)
        .expect("provider id is a unique key");
}

#[rstest]
fn unconfigured_backings_are_reported() {
    let mut mapping = FieldMapping::default();
    mapping.postal_code.backing = Some(String::new());
    let store = SqliteReferenceStore::open_in_memory(mapping).expect("open store");
    let err = store
        .check_backing(EntityKind::PostalCode)
        .expect_err("unconfigured");
    assert!(matches!(
        err,
        StoreError::Unconfigured {
            kind: EntityKind::PostalCode
        }
    ));
}

#[rstest]
fn invalid_mappings_are_rejected_on_open() {
    let mut mapping = FieldMapping::default();
    mapping.country.name_field = "name; DROP TABLE countries".into();
    let err = SqliteReferenceStore::open_in_memory(mapping).expect_err("invalid mapping");
    assert!(matches!(err, StoreOpenError::Mapping(_)));
}

#[rstest]
fn countries_are_upserted_on_provider_id(mut store: SqliteReferenceStore) {
    let first = store
        .upsert_country(&CountryUpsert {
            provider_id: ProviderId(7),
            sign: "XX".into(),
            name: "Xland".into(),
        })
        .expect("insert");
    let second = store
        .upsert_country(&CountryUpsert {
            provider_id: ProviderId(7),
            sign: "XX".into(),
            name: "Xland Republic".into(),
        })
        .expect("update");

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Xland Republic");
    let found = store
        .find_country_by_sign("XX")
        .expect("query")
        .expect("country present");
    assert_eq!(found, second);
    let by_provider = store
        .find_country_by_provider_id(ProviderId(7))
        .expect("query");
    assert_eq!(by_provider, Some(second));
}

#[rstest]
fn seeded_countries_without_provider_ids_are_found_by_sign(store: SqliteReferenceStore) {
    store
        .connection()
        .execute("INSERT INTO countries (sign, name) VALUES ('DE', 'Germany')", [])
        .expect("seed country");
    let country = store
        .find_country_by_sign("DE")
        .expect("query")
        .expect("country present");
    assert!(country.provider_id.is_none());
    assert!(store.find_country_by_sign("FR").expect("query").is_none());
}

#[rstest]
fn signs_match_regardless_of_case(store: SqliteReferenceStore) {
    store
        .connection()
        .execute("INSERT INTO countries (sign, name) VALUES ('DE', 'Germany')", [])
        .expect("seed country");
    let country = store
        .find_country_by_sign("de")
        .expect("query")
        .expect("country present");
    assert_eq!(country.sign, "DE");
}

#[rstest]
fn oversized_provider_ids_are_rejected(mut store: SqliteReferenceStore) {
    let err = store
        .upsert_country(&CountryUpsert {
            provider_id: ProviderId(u64::MAX),
            sign: "ZZ".into(),
            name: "Overflow".into(),
        })
        .expect_err("out of range");
    assert!(matches!(err, StoreError::ProviderIdOutOfRange { .. }));
}

#[rstest]
fn regions_require_an_existing_country(mut store: SqliteReferenceStore) {
    let err = store
        .upsert_region(&RegionUpsert {
            provider_id: ProviderId(3),
            name: "Berlin".into(),
            country_id: RecordId(404),
        })
        .expect_err("missing parent");
    assert!(matches!(
        err,
        StoreError::MissingParent {
            kind: EntityKind::Country,
            id: RecordId(404)
        }
    ));
    assert!(
        store
            .find_region_by_provider_id(ProviderId(3))
            .expect("query")
            .is_none()
    );
}

#[rstest]
fn refreshed_cities_keep_their_region(mut store: SqliteReferenceStore) {
    let country_id = germany(&mut store);
    let region = store
        .upsert_region(&RegionUpsert {
            provider_id: ProviderId(3),
            name: "Berlin".into(),
            country_id,
        })
        .expect("insert region");

    let linked = store
        .upsert_city(&city(country_id, Some(region.id)))
        .expect("insert city");
    let refreshed = store
        .upsert_city(&city(country_id, None))
        .expect("refresh city");

    assert_eq!(linked.id, refreshed.id);
    assert_eq!(refreshed.region_id, Some(region.id));
    assert_eq!(refreshed.latitude, Some(52.52));
    let stored = store
        .find_city_by_provider_id(ProviderId(11))
        .expect("query")
        .expect("city present");
    assert_eq!(stored, refreshed);
}

#[rstest]
fn unmapped_coordinates_are_not_stored() {
    let mut mapping = FieldMapping::default();
    mapping.city.latitude_field = None;
    mapping.city.longitude_field = None;
    let mut store = SqliteReferenceStore::open_in_memory(mapping).expect("open store");
    store.initialise_schema().expect("create schema");
    store.check_backing(EntityKind::City).expect("city backing");

    let country_id = germany(&mut store);
    let stored = store.upsert_city(&city(country_id, None)).expect("insert city");
    assert!(stored.latitude.is_none());
    assert!(stored.longitude.is_none());
}

#[rstest]
fn postal_codes_are_never_deduplicated(mut store: SqliteReferenceStore) {
    let country_id = germany(&mut store);
    let berlin = store.upsert_city(&city(country_id, None)).expect("insert city");
    for external_id in ["a", "b"] {
        store
            .insert_postal_code(&NewPostalCode {
                code: "10115".into(),
                slug: "10115".into(),
                external_id: external_id.into(),
                city_id: berlin.id,
            })
            .expect("insert postal code");
    }
    let codes = store.postal_codes_for_city(berlin.id).expect("list");
    assert_eq!(codes.len(), 2);
    assert!(codes.iter().all(|code| code.code == "10115"));
    assert!(store.postal_codes_for_city(RecordId(999)).expect("list").is_empty());
}

#[rstest]
fn postal_codes_require_an_existing_city(mut store: SqliteReferenceStore) {
    let err = store
        .insert_postal_code(&NewPostalCode {
            code: "10115".into(),
            slug: "10115".into(),
            external_id: "x".into(),
            city_id: RecordId(12),
        })
        .expect_err("missing city");
    assert!(matches!(
        err,
        StoreError::MissingParent {
            kind: EntityKind::City,
            ..
        }
    ));
}

fn database_in(temp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
        .expect("utf-8 temp dir")
        .join("nested/geosync.db")
}

fn xland(name: &str) -> CountryUpsert {
    CountryUpsert {
        provider_id: ProviderId(7),
        sign: "XX".into(),
        name: name.into(),
    }
}

fn country_rows(store: &SqliteReferenceStore) -> i64 {
    store
        .connection()
        .query_row("SELECT COUNT(*) FROM countries", [], |row| row.get(0))
        .expect("count countries")
}

#[rstest]
fn interleaved_connections_share_one_row_per_provider_id() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = database_in(&temp);
    let mut first = SqliteReferenceStore::open(&path, FieldMapping::default()).expect("open");
    first.initialise_schema().expect("create schema");
    let mut second = SqliteReferenceStore::open(&path, FieldMapping::default()).expect("open");

    let inserted = first.upsert_country(&xland("Xland")).expect("first upsert");
    let refreshed = second
        .upsert_country(&xland("Xland Republic"))
        .expect("second upsert");

    assert_eq!(inserted.id, refreshed.id);
    assert_eq!(country_rows(&first), 1);
    let stored = first
        .find_country_by_provider_id(ProviderId(7))
        .expect("query")
        .expect("country present");
    assert_eq!(stored.name, "Xland Republic");
}

#[rstest]
fn concurrent_upserts_of_one_provider_id_create_one_row() {
    const WRITERS: usize = 4;
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = database_in(&temp);
    let mut store = SqliteReferenceStore::open(&path, FieldMapping::default()).expect("open");
    store.initialise_schema().expect("create schema");

    let barrier = Barrier::new(WRITERS);
    let ids: Vec<RecordId> = thread::scope(|scope| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let path = &path;
                let barrier = &barrier;
                scope.spawn(move || {
                    let mut store = SqliteReferenceStore::open(path, FieldMapping::default())
                        .expect("open per-thread store");
                    barrier.wait();
                    store
                        .upsert_country(&xland(&format!("Xland {writer}")))
                        .expect("concurrent upsert")
                        .id
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .collect()
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(country_rows(&store), 1);
    store.upsert_country(&xland("Xland")).expect("final upsert");
    assert_eq!(country_rows(&store), 1);
}

#[rstest]
fn databases_on_disk_survive_reopening() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = database_in(&temp);

    let mut store = SqliteReferenceStore::open(&path, FieldMapping::default()).expect("open");
    store.initialise_schema().expect("create schema");
    germany(&mut store);
    drop(store);

    let reopened = SqliteReferenceStore::open(&path, FieldMapping::default()).expect("reopen");
    assert!(reopened.find_country_by_sign("DE").expect("query").is_some());
}
