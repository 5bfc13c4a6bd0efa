//! `init` command: create the configured reference tables.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;
use crate::options::{ARG_DATABASE, ARG_MAPPING, StoreOptions};

/// CLI arguments for the `init` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "init",
    long_about = "Create the country, region, city and postal code tables \
                 described by the field mapping, together with their \
                 uniqueness constraints and lookup indexes. Existing tables \
                 are left untouched.",
    about = "Create the reference tables"
)]
#[ortho_config(prefix = "GEOSYNC")]
pub(crate) struct InitArgs {
    /// Path to the SQLite database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Path to a JSON field mapping.
    #[arg(long = ARG_MAPPING, value_name = "path")]
    #[serde(default)]
    pub(crate) mapping: Option<Utf8PathBuf>,
}

impl InitArgs {
    pub(crate) fn into_options(self) -> Result<StoreOptions, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(StoreOptions::resolve(merged.database, merged.mapping))
    }
}

pub(crate) fn run_init(args: InitArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let options = args.into_options()?;
    initialise(&options, writer)
}

pub(crate) fn initialise(options: &StoreOptions, writer: &mut dyn Write) -> Result<(), CliError> {
    let mut store = options.open()?;
    store
        .initialise_schema()
        .map_err(|source| CliError::InitialiseSchema {
            path: options.database.clone(),
            source,
        })?;
    log::info!("reference schema ready in {}", options.database);
    writeln!(writer, "schema initialised in {}", options.database).map_err(CliError::WriteReport)
}
