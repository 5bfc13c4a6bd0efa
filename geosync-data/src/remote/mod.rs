//! HTTP access to the reference-data provider.
//!
//! [`HttpRemoteClient`] implements [`geosync_core::RemoteClient`] by issuing
//! authenticated GET requests against `{base_url}{route}` with the request
//! parameters encoded in the query string. The synchronous trait is served by
//! blocking on an owned Tokio runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use geosync_core::{RemoteClient, Route};
//! use geosync_data::remote::{HttpRemoteClient, HttpRemoteClientConfig};
//!
//! let config = HttpRemoteClientConfig::new("secret-token")
//!     .with_timeout(Duration::from_secs(10));
//! let client = HttpRemoteClient::with_config(config)?;
//! let body = client.request(Route::Countries, &[("signs", "DE".to_owned())])?;
//! println!("{body}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;

pub use client::{
    ClientBuildError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    HttpRemoteClient, HttpRemoteClientConfig,
};
