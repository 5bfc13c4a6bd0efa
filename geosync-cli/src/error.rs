//! Error types emitted by the geosync CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geosync_data::{ClientBuildError, SchemaError, StoreOpenError};
use geosync_resolver::ResolveError;
use thiserror::Error;

/// Errors emitted by the geosync CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Reading the field-mapping file failed.
    #[error("failed to read field mapping at {path:?}: {source}")]
    ReadMapping {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The field-mapping file is not a valid mapping document.
    #[error("failed to parse field mapping at {path:?}: {source}")]
    ParseMapping {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Opening the reference database failed.
    #[error("failed to open reference database at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreOpenError,
    },
    /// Creating the reference tables failed.
    #[error("failed to initialise schema in {path:?}: {source}")]
    InitialiseSchema {
        path: Utf8PathBuf,
        #[source]
        source: SchemaError,
    },
    /// Constructing the HTTP client failed.
    #[error("failed to build reference client for {base_url:?}: {source}")]
    BuildClient {
        base_url: String,
        #[source]
        source: ClientBuildError,
    },
    /// A resolution call failed.
    #[error("failed to load {label}: {source}")]
    Resolve {
        label: &'static str,
        #[source]
        source: ResolveError,
    },
    /// Writing the command report failed.
    #[error("failed to write report: {0}")]
    WriteReport(#[source] std::io::Error),
}
