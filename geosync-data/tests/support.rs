//! Shared helpers for the geosync-data integration tests.

use std::time::Duration;

use geosync_data::{HttpRemoteClient, HttpRemoteClientConfig};
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer};

/// Token the mock provider expects in the `Authorization` header.
pub const API_TOKEN: &str = "test-token";

/// Mock reference provider running on its own multi-threaded runtime.
///
/// The client under test is blocking, so the server must be driven by a
/// runtime the test thread is not inside.
pub struct MockProvider {
    server: MockServer,
    runtime: Runtime,
}

impl MockProvider {
    /// Start an empty mock provider.
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap_or_else(|err| panic!("start runtime: {err}"));
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    /// Register a mock response.
    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// Base URL clients should be pointed at.
    pub fn base_url(&self) -> String {
        format!("{}/v2/references/", self.server.uri())
    }

    /// Client configured for this provider with a short timeout.
    pub fn client(&self) -> HttpRemoteClient {
        let config = HttpRemoteClientConfig::new(API_TOKEN)
            .with_base_url(self.base_url())
            .with_timeout(Duration::from_secs(5));
        HttpRemoteClient::with_config(config).unwrap_or_else(|err| panic!("build client: {err}"))
    }
}
