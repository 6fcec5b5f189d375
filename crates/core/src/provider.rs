//! The seam between the fetch pipeline and cloud provider queries

use crate::{Dataset, Scope};
use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// Normalized failure of a single provider query
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum ProviderError {
    /// The provider has no query for this service
    #[error("Unsupported service: {service}")]
    #[diagnostic(code(resviz::provider::unsupported))]
    Unsupported {
        /// Requested service name
        service: String,
    },

    /// No credentials could be resolved for the scope
    #[error("{service}: credentials not found")]
    #[diagnostic(
        code(resviz::provider::credentials),
        help("Configure the profile with `aws configure` or `aws sso login`")
    )]
    MissingCredentials {
        /// Service being queried
        service: String,
    },

    /// The provider API returned an error
    #[error("{service} data fetch error ({code}): {message}")]
    #[diagnostic(code(resviz::provider::api))]
    Api {
        /// Service being queried
        service: String,
        /// Provider error code, e.g. `AccessDenied`
        code: String,
        /// Provider error message
        message: String,
    },

    /// Anything else (network, decoding, SDK internals)
    #[error("{service} data fetch error: {message}")]
    #[diagnostic(code(resviz::provider::unexpected))]
    Unexpected {
        /// Service being queried
        service: String,
        /// Description of the failure
        message: String,
    },
}

impl ProviderError {
    /// Create an unsupported-service error
    #[must_use]
    pub fn unsupported(service: impl Into<String>) -> Self {
        Self::Unsupported {
            service: service.into(),
        }
    }

    /// Create an API error
    #[must_use]
    pub fn api(
        service: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            service: service.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected error
    #[must_use]
    pub fn unexpected(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unexpected {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Service the failure belongs to
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::Unsupported { service }
            | Self::MissingCredentials { service }
            | Self::Api { service, .. }
            | Self::Unexpected { service, .. } => service,
        }
    }

    /// Whether the failure is an authentication problem
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::MissingCredentials { .. } => true,
            Self::Api { code, .. } => matches!(
                code.as_str(),
                "ExpiredToken"
                    | "ExpiredTokenException"
                    | "UnrecognizedClientException"
                    | "InvalidClientTokenId"
                    | "AuthFailure"
            ),
            _ => false,
        }
    }
}

/// A source of inventory rows for a service within a scope
///
/// Implementations are independently fallible per service and handle their
/// own pagination and rate limits.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Query every resource of `service` visible in `scope`
    async fn query(&self, service: &str, scope: &Scope) -> Result<Dataset, ProviderError>;
}
