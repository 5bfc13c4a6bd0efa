//! Errors surfaced by the resolution engine.

use geosync_core::{RemoteError, Route, StoreError};
use thiserror::Error;

/// Failures that abort a resolution call.
///
/// Provider failures other than throttling never appear here; the engine logs
/// them and carries on with an empty response.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The backing for an entity kind is missing or unconfigured.
    #[error("invalid reference store configuration: {source}")]
    Configuration {
        /// Store error describing the missing backing.
        #[source]
        source: StoreError,
    },
    /// The provider throttled a request.
    #[error("provider rate limited the {route} request: {source}")]
    RateLimited {
        /// Route that was throttled.
        route: Route,
        /// Error reported by the client.
        #[source]
        source: RemoteError,
    },
    /// The reference store failed.
    #[error("reference store failed: {source}")]
    Store {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl ResolveError {
    /// Whether the call failed because the provider throttled it.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<StoreError> for ResolveError {
    fn from(source: StoreError) -> Self {
        if source.is_configuration() {
            Self::Configuration { source }
        } else {
            Self::Store { source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosync_core::{EntityKind, ProviderId};
    use rstest::rstest;

    #[rstest]
    fn store_configuration_errors_become_configuration_failures() {
        let err = ResolveError::from(StoreError::Unconfigured {
            kind: EntityKind::Region,
        });
        assert!(matches!(err, ResolveError::Configuration { .. }));
    }

    #[rstest]
    fn other_store_errors_stay_store_failures() {
        let err = ResolveError::from(StoreError::ProviderIdOutOfRange {
            provider_id: ProviderId(u64::MAX),
        });
        assert!(matches!(err, ResolveError::Store { .. }));
        assert!(!err.is_rate_limited());
    }
}
