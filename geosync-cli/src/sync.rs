//! `countries`, `regions` and `cities` commands: pull reference records from
//! the provider into the local database.
//!
//! Each command merges its configuration layers, opens the database, runs one
//! resolution call and reports how many records it returned and how long the
//! call took.

use std::io::Write;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use clap::Parser;
use geosync_core::{ProviderId, RemoteClient};
use geosync_data::SqliteReferenceStore;
use geosync_resolver::{DEFAULT_CITY_LIMIT, EngineOptions, ResolutionEngine, ResolveError};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;
use crate::options::{
    ARG_API_TOKEN, ARG_API_URL, ARG_DATABASE, ARG_LANGUAGE, ARG_MAPPING, ARG_TIMEOUT_SECS,
    ClientBuilder, RemoteArgs, RemoteOptions, StoreOptions,
};

pub(crate) const ARG_QUERY: &str = "query";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ENV_COUNTRIES_API_TOKEN: &str = "GEOSYNC_CMDS_COUNTRIES_API_TOKEN";
pub(crate) const ENV_REGIONS_API_TOKEN: &str = "GEOSYNC_CMDS_REGIONS_API_TOKEN";
pub(crate) const ENV_CITIES_API_TOKEN: &str = "GEOSYNC_CMDS_CITIES_API_TOKEN";
pub(crate) const ENV_CITIES_QUERY: &str = "GEOSYNC_CMDS_CITIES_QUERY";

type Engine<'a> = ResolutionEngine<SqliteReferenceStore, Box<dyn RemoteClient + 'a>>;

/// CLI arguments for the `countries` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "countries",
    long_about = "Resolve countries by sign. Signs already stored locally are \
                 served from the database; the rest are fetched from the \
                 provider in one request and stored.",
    about = "Load countries by sign"
)]
#[ortho_config(prefix = "GEOSYNC")]
pub(crate) struct CountriesArgs {
    /// Country signs such as `DE` or `UA`.
    #[arg(value_name = "sign")]
    #[serde(default)]
    pub(crate) signs: Vec<String>,
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Path to a JSON field mapping.
    #[arg(long = ARG_MAPPING, value_name = "path")]
    #[serde(default)]
    pub(crate) mapping: Option<Utf8PathBuf>,
    /// Base URL of the reference API.
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// Token sent in the `Authorization` header.
    #[arg(long = ARG_API_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) api_token: Option<String>,
    /// Language requested from the provider.
    #[arg(long = ARG_LANGUAGE, value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

/// CLI arguments for the `regions` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "regions",
    long_about = "Fetch regions by provider id and store them together with \
                 their countries. Regions whose country cannot be resolved \
                 are skipped.",
    about = "Load regions by provider id"
)]
#[ortho_config(prefix = "GEOSYNC")]
pub(crate) struct RegionsArgs {
    /// Provider ids of the regions to load.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) ids: Vec<u64>,
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Path to a JSON field mapping.
    #[arg(long = ARG_MAPPING, value_name = "path")]
    #[serde(default)]
    pub(crate) mapping: Option<Utf8PathBuf>,
    /// Base URL of the reference API.
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// Token sent in the `Authorization` header.
    #[arg(long = ARG_API_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) api_token: Option<String>,
    /// Language requested from the provider.
    #[arg(long = ARG_LANGUAGE, value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

/// CLI arguments for the `cities` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "cities",
    long_about = "Autocomplete cities by name, or by postal code when the \
                 query is numeric, and store every match with its country, \
                 region and postal codes.",
    about = "Load cities matching a query"
)]
#[ortho_config(prefix = "GEOSYNC")]
pub(crate) struct CitiesArgs {
    /// City name fragment or postal code.
    #[arg(value_name = "query")]
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Maximum number of predictions requested.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<u32>,
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Path to a JSON field mapping.
    #[arg(long = ARG_MAPPING, value_name = "path")]
    #[serde(default)]
    pub(crate) mapping: Option<Utf8PathBuf>,
    /// Base URL of the reference API.
    #[arg(long = ARG_API_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) api_url: Option<String>,
    /// Token sent in the `Authorization` header.
    #[arg(long = ARG_API_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) api_token: Option<String>,
    /// Language requested from the provider.
    #[arg(long = ARG_LANGUAGE, value_name = "code")]
    #[serde(default)]
    pub(crate) language: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

/// Resolved `countries` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CountriesConfig {
    pub(crate) signs: Vec<String>,
    pub(crate) store: StoreOptions,
    pub(crate) remote: RemoteOptions,
}

/// Resolved `regions` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegionsConfig {
    pub(crate) ids: Vec<ProviderId>,
    pub(crate) store: StoreOptions,
    pub(crate) remote: RemoteOptions,
}

/// Resolved `cities` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CitiesConfig {
    pub(crate) query: String,
    pub(crate) limit: u32,
    pub(crate) store: StoreOptions,
    pub(crate) remote: RemoteOptions,
}

impl CountriesArgs {
    pub(crate) fn into_config(self) -> Result<CountriesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CountriesConfig::try_from(merged)
    }
}

impl RegionsArgs {
    pub(crate) fn into_config(self) -> Result<RegionsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RegionsConfig::try_from(merged)
    }
}

impl CitiesArgs {
    pub(crate) fn into_config(self) -> Result<CitiesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CitiesConfig::try_from(merged)
    }
}

impl TryFrom<CountriesArgs> for CountriesConfig {
    type Error = CliError;

    fn try_from(args: CountriesArgs) -> Result<Self, Self::Error> {
        let remote = RemoteArgs {
            api_url: args.api_url,
            api_token: args.api_token,
            language: args.language,
            timeout_secs: args.timeout_secs,
        };
        Ok(Self {
            signs: args.signs,
            store: StoreOptions::resolve(args.database, args.mapping),
            remote: RemoteOptions::resolve(remote, ENV_COUNTRIES_API_TOKEN)?,
        })
    }
}

impl TryFrom<RegionsArgs> for RegionsConfig {
    type Error = CliError;

    fn try_from(args: RegionsArgs) -> Result<Self, Self::Error> {
        let remote = RemoteArgs {
            api_url: args.api_url,
            api_token: args.api_token,
            language: args.language,
            timeout_secs: args.timeout_secs,
        };
        Ok(Self {
            ids: args.ids.into_iter().map(ProviderId).collect(),
            store: StoreOptions::resolve(args.database, args.mapping),
            remote: RemoteOptions::resolve(remote, ENV_REGIONS_API_TOKEN)?,
        })
    }
}

impl TryFrom<CitiesArgs> for CitiesConfig {
    type Error = CliError;

    fn try_from(args: CitiesArgs) -> Result<Self, Self::Error> {
        let query = args
            .query
            .filter(|query| !query.trim().is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_QUERY,
                env: ENV_CITIES_QUERY,
            })?;
        let remote = RemoteArgs {
            api_url: args.api_url,
            api_token: args.api_token,
            language: args.language,
            timeout_secs: args.timeout_secs,
        };
        Ok(Self {
            query,
            limit: args.limit.unwrap_or(DEFAULT_CITY_LIMIT),
            store: StoreOptions::resolve(args.database, args.mapping),
            remote: RemoteOptions::resolve(remote, ENV_CITIES_API_TOKEN)?,
        })
    }
}

pub(crate) fn run_countries(
    args: CountriesArgs,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    sync_countries(&config, builder, writer)
}

pub(crate) fn run_regions(
    args: RegionsArgs,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    sync_regions(&config, builder, writer)
}

pub(crate) fn run_cities(
    args: CitiesArgs,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    sync_cities(&config, builder, writer)
}

pub(crate) fn sync_countries(
    config: &CountriesConfig,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    sync(&config.store, &config.remote, builder, writer, "countries", |engine| {
        engine.resolve_countries(&config.signs, None)
    })
}

pub(crate) fn sync_regions(
    config: &RegionsConfig,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    sync(&config.store, &config.remote, builder, writer, "regions", |engine| {
        engine.resolve_regions(config.ids.iter().copied(), None)
    })
}

pub(crate) fn sync_cities(
    config: &CitiesConfig,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    sync(&config.store, &config.remote, builder, writer, "cities", |engine| {
        engine.autocomplete_city(&config.query, config.limit, None)
    })
}

fn sync<T>(
    store: &StoreOptions,
    remote: &RemoteOptions,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
    label: &'static str,
    resolve: impl FnOnce(&mut Engine<'_>) -> Result<Vec<T>, ResolveError>,
) -> Result<(), CliError> {
    let reference_store = store.open()?;
    let client = builder.build(remote)?;
    let options = EngineOptions::from_mapping(reference_store.mapping())
        .with_default_language(remote.language.clone());
    let mut engine = ResolutionEngine::with_options(reference_store, client, options);

    let started = Instant::now();
    let records = resolve(&mut engine).map_err(|source| CliError::Resolve { label, source })?;
    let elapsed = started.elapsed();
    log::info!("{} {label} resolved in {elapsed:?}", records.len());
    write_report(writer, records.len(), label, elapsed)
}

/// Write the one-line summary printed after every sync command.
pub(crate) fn write_report(
    writer: &mut dyn Write,
    count: usize,
    label: &str,
    elapsed: Duration,
) -> Result<(), CliError> {
    writeln!(
        writer,
        "{count} {label} loaded and updated in {:.3}s",
        elapsed.as_secs_f64()
    )
    .map_err(CliError::WriteReport)
}

#[cfg(test)]
pub(crate) fn cities_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<CitiesConfig, CliError> {
    let merged = CitiesArgs::merge_from_layers(layers).map_err(CliError::from)?;
    CitiesConfig::try_from(merged)
}
