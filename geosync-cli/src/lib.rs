//! Command-line interface for syncing geographic reference data.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};

mod error;
mod init;
mod options;
mod sync;

pub use error::CliError;

use init::{InitArgs, run_init};
use options::{ClientBuilder, HttpClientBuilder};
use sync::{CitiesArgs, CountriesArgs, RegionsArgs, run_cities, run_countries, run_regions};

/// Log filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "geosync=info";

/// Run the geosync CLI with the current process arguments and environment.
///
/// Reports are written to standard output.
///
/// # Errors
///
/// Returns a [`CliError`] when parsing, configuration, storage or the
/// reference provider fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli, &HttpClientBuilder, &mut stdout)
}

fn dispatch(cli: Cli, builder: &dyn ClientBuilder, writer: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Init(args) => run_init(args, writer),
        Command::Countries(args) => run_countries(args, builder, writer),
        Command::Regions(args) => run_regions(args, builder, writer),
        Command::Cities(args) => run_cities(args, builder, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geosync",
    about = "Sync country, region, city and postal code reference data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the reference tables described by the field mapping.
    Init(InitArgs),
    /// Load countries by sign.
    Countries(CountriesArgs),
    /// Load regions by provider id.
    Regions(RegionsArgs),
    /// Load cities matching a name or postal code.
    Cities(CitiesArgs),
}

#[cfg(test)]
mod tests;
