//! Settings shared by every subcommand once configuration layers are merged.

use std::{fmt, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use geosync_core::{FieldMapping, RemoteClient};
use geosync_data::remote::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use geosync_data::{HttpRemoteClient, HttpRemoteClientConfig, SqliteReferenceStore};
use geosync_resolver::DEFAULT_LANGUAGE;

use crate::CliError;

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_MAPPING: &str = "mapping";
pub(crate) const ARG_API_URL: &str = "api-url";
pub(crate) const ARG_API_TOKEN: &str = "api-token";
pub(crate) const ARG_LANGUAGE: &str = "language";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";

/// Database used when neither flags, environment nor files name one.
pub(crate) const DEFAULT_DATABASE: &str = "geosync.db";

/// Where reference records live and how they are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreOptions {
    /// SQLite database path.
    pub(crate) database: Utf8PathBuf,
    /// Optional JSON field mapping; defaults apply when absent.
    pub(crate) mapping: Option<Utf8PathBuf>,
}

impl StoreOptions {
    pub(crate) fn resolve(database: Option<Utf8PathBuf>, mapping: Option<Utf8PathBuf>) -> Self {
        Self {
            database: database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            mapping,
        }
    }

    /// Load the configured field mapping, or the defaults.
    pub(crate) fn load_mapping(&self) -> Result<FieldMapping, CliError> {
        self.mapping
            .as_deref()
            .map_or_else(|| Ok(FieldMapping::default()), load_mapping_file)
    }

    /// Open the reference database with the configured mapping.
    pub(crate) fn open(&self) -> Result<SqliteReferenceStore, CliError> {
        let mapping = self.load_mapping()?;
        SqliteReferenceStore::open(&self.database, mapping).map_err(|source| {
            CliError::OpenStore {
                path: self.database.clone(),
                source,
            }
        })
    }
}

fn load_mapping_file(path: &Utf8Path) -> Result<FieldMapping, CliError> {
    let read_error = |source| CliError::ReadMapping {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        read_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "mapping path has no file name",
        ))
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
    let contents = dir.read_to_string(file_name).map_err(read_error)?;
    serde_json::from_str(&contents).map_err(|source| CliError::ParseMapping {
        path: path.to_path_buf(),
        source,
    })
}

/// How to reach the reference-data provider.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct RemoteOptions {
    /// Base URL the route paths are appended to.
    pub(crate) api_url: String,
    /// Token sent verbatim in the `Authorization` header.
    pub(crate) api_token: String,
    /// Language used for every request of the run.
    pub(crate) language: String,
    /// Whole-request timeout.
    pub(crate) timeout: Duration,
}

impl fmt::Debug for RemoteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteOptions")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Raw remote settings as they come out of a merged argument struct.
#[derive(Debug, Default)]
pub(crate) struct RemoteArgs {
    pub(crate) api_url: Option<String>,
    pub(crate) api_token: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
}

impl RemoteOptions {
    /// Apply defaults to `args`; the token has none and must be supplied.
    pub(crate) fn resolve(args: RemoteArgs, token_env: &'static str) -> Result<Self, CliError> {
        let api_token = args
            .api_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_API_TOKEN,
                env: token_env,
            })?;
        Ok(Self {
            api_url: args.api_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            api_token,
            language: args
                .language
                .filter(|language| !language.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    pub(crate) fn client_config(&self) -> HttpRemoteClientConfig {
        HttpRemoteClientConfig::new(self.api_token.clone())
            .with_base_url(self.api_url.clone())
            .with_timeout(self.timeout)
    }
}

/// Builds the remote client for one command invocation.
pub(crate) trait ClientBuilder {
    fn build(&self, options: &RemoteOptions) -> Result<Box<dyn RemoteClient + '_>, CliError>;
}

/// Connects to the provider over HTTP.
pub(crate) struct HttpClientBuilder;

impl ClientBuilder for HttpClientBuilder {
    fn build(&self, options: &RemoteOptions) -> Result<Box<dyn RemoteClient + '_>, CliError> {
        let client = HttpRemoteClient::with_config(options.client_config()).map_err(|source| {
            CliError::BuildClient {
                base_url: options.api_url.clone(),
                source,
            }
        })?;
        Ok(Box::new(client))
    }
}
