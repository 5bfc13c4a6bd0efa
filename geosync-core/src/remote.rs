//! Boundary to the remote reference-data provider.
//!
//! The [`RemoteClient`] trait is synchronous so the resolution engine stays
//! embeddable in synchronous callers; HTTP implementations block internally.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Query parameters sent with a request, in insertion order.
pub type QueryParams = Vec<(&'static str, String)>;

/// Provider endpoints consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Countries by comma-separated signs.
    Countries,
    /// Regions by comma-separated provider ids.
    Areas,
    /// Towns by free-text name query.
    Towns,
    /// Towns by numeric postal-code query.
    TownsByPostcode,
}

impl Route {
    /// Path relative to the provider's base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Countries => "countries",
            Self::Areas => "areas",
            Self::Towns => "towns",
            Self::TownsByPostcode => "towns/by/postcode",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Errors reported by a [`RemoteClient`].
///
/// Only [`RemoteError::RateLimited`] is fatal to a resolution; the engine
/// treats every other variant as an empty response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The provider throttled the request (HTTP 429).
    #[error("request to {url} was rate limited")]
    RateLimited {
        /// Request URL.
        url: String,
    },
    /// The provider answered with another non-success status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The client cannot block the calling thread to drive the request.
    #[error("cannot wait for {url} from inside a current-thread Tokio runtime")]
    UnsupportedRuntime {
        /// Request URL.
        url: String,
    },
    /// The response body was not valid JSON.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder error description.
        message: String,
    },
}

impl RemoteError {
    /// Whether the provider throttled the request.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Issue authenticated GET requests against the provider.
///
/// # Examples
///
/// ```rust
/// use geosync_core::{RemoteClient, RemoteError, Route};
/// use serde_json::{Value, json};
///
/// struct Fixed;
///
/// impl RemoteClient for Fixed {
///     fn request(
///         &self,
///         route: Route,
///         _params: &[(&'static str, String)],
///     ) -> Result<Value, RemoteError> {
///         match route {
///             Route::Countries => Ok(json!([{ "id": 7, "sign": "XX", "name": "Xland" }])),
///             _ => Ok(json!([])),
///         }
///     }
/// }
///
/// let body = Fixed.request(Route::Countries, &[("signs", "XX".into())])?;
/// assert_eq!(body[0]["sign"], "XX");
/// # Ok::<(), RemoteError>(())
/// ```
pub trait RemoteClient {
    /// Send one request to `route` with `params` and return the decoded body.
    fn request(&self, route: Route, params: &[(&'static str, String)])
    -> Result<Value, RemoteError>;
}

impl<T: RemoteClient + ?Sized> RemoteClient for &T {
    fn request(
        &self,
        route: Route,
        params: &[(&'static str, String)],
    ) -> Result<Value, RemoteError> {
        (**self).request(route, params)
    }
}

impl<T: RemoteClient + ?Sized> RemoteClient for Box<T> {
    fn request(
        &self,
        route: Route,
        params: &[(&'static str, String)],
    ) -> Result<Value, RemoteError> {
        (**self).request(route, params)
    }
}
