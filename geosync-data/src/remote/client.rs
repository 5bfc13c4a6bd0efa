//! `RemoteClient` over reqwest.

use std::fmt;
use std::time::Duration;

use geosync_core::{RemoteClient, RemoteError, Route};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, InvalidHeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

/// Provider endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.lardi-trans.com/v2/references/";

/// Default user agent for provider requests.
pub const DEFAULT_USER_AGENT: &str = "geosync/0.1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest response body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Errors raised while constructing an [`HttpRemoteClient`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The base URL does not parse or cannot carry paths.
    #[error("invalid provider base URL {url:?}: {reason}")]
    InvalidBaseUrl {
        /// Configured URL.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },
    /// The API token cannot be sent as a header value.
    #[error("API token is not a valid header value")]
    InvalidToken(#[source] InvalidHeaderValue),
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Configuration for [`HttpRemoteClient`].
#[derive(Clone)]
pub struct HttpRemoteClientConfig {
    /// Base URL every route is appended to.
    pub base_url: String,
    /// Token sent verbatim in the `Authorization` header.
    pub api_token: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl fmt::Debug for HttpRemoteClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRemoteClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for HttpRemoteClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_token: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpRemoteClientConfig {
    /// Create a configuration for the default provider using `api_token`.
    #[must_use]
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Authenticated HTTP client for the reference-data provider.
///
/// # Runtime behaviour
///
/// Outside any Tokio runtime the client blocks on its own runtime. Inside a
/// multi-threaded runtime it uses that runtime's handle with
/// [`tokio::task::block_in_place`]. A `current_thread` runtime cannot be
/// blocked from one of its own tasks, so calls made there fail with
/// [`RemoteError::UnsupportedRuntime`] without sending anything.
///
/// # Status handling
///
/// HTTP 429 maps to [`RemoteError::RateLimited`]; any other non-success
/// status maps to [`RemoteError::Http`] carrying the start of the body.
pub struct HttpRemoteClient {
    client: Client,
    base_url: Url,
    config: HttpRemoteClientConfig,
    runtime: Runtime,
}

impl fmt::Debug for HttpRemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRemoteClient")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteClient {
    /// Create a client for the default provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the token, HTTP client or Tokio runtime is invalid.
    pub fn new(api_token: impl Into<String>) -> Result<Self, ClientBuildError> {
        Self::with_config(HttpRemoteClientConfig::new(api_token))
    }

    /// Create a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL, token, HTTP client or Tokio runtime
    /// is invalid.
    pub fn with_config(config: HttpRemoteClientConfig) -> Result<Self, ClientBuildError> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut token =
            HeaderValue::from_str(&config.api_token).map_err(ClientBuildError::InvalidToken)?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self {
            client,
            base_url,
            config,
            runtime,
        })
    }

    /// The configuration the client was built from.
    #[must_use]
    pub const fn config(&self) -> &HttpRemoteClientConfig {
        &self.config
    }

    /// Build the request URL for `route` with `params` as the query string.
    fn build_url(&self, route: Route, params: &[(&'static str, String)]) -> Result<Url, RemoteError> {
        let mut url = self
            .base_url
            .join(route.path())
            .map_err(|err| RemoteError::Network {
                url: self.base_url.to_string(),
                message: err.to_string(),
            })?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(name, value)| (*name, value.as_str())));
        }
        Ok(url)
    }

    async fn request_async(&self, url: Url) -> Result<Value, RemoteError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| RemoteError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            })
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &Url) -> RemoteError {
        if error.is_timeout() {
            return RemoteError::Timeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        RemoteError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

impl RemoteClient for HttpRemoteClient {
    fn request(
        &self,
        route: Route,
        params: &[(&'static str, String)],
    ) -> Result<Value, RemoteError> {
        let url = self.build_url(route, params)?;
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.request_async(url)))
            }
            Ok(_) => Err(RemoteError::UnsupportedRuntime {
                url: url.to_string(),
            }),
            Err(_) => self.runtime.block_on(self.request_async(url)),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientBuildError> {
    let invalid = |reason: String| ClientBuildError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason,
    };
    // Without a trailing slash `Url::join` would replace the last segment.
    let normalised = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalised).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_owned()));
    }
    Ok(url)
}

fn truncate(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}
