//! Service credential pair for the remote identity API.
//!
//! The service credential identifies the mirror process itself: it signs
//! every call to the identity API, including delegated user logins where
//! the end-user credential travels only in the request body. End-user
//! credentials are never stored.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Credential pair identifying the synchronization/authentication process
/// to the remote identity API.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCredentials {
    /// Service identifier (OAuth2 client id).
    pub service_id: String,

    /// Service secret (OAuth2 client secret).
    pub service_secret: SecretString,
}

impl ServiceCredentials {
    /// Create new service credentials.
    #[must_use]
    pub fn new(service_id: impl Into<String>, service_secret: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            service_secret: SecretString::from(service_secret.into()),
        }
    }

    /// Get the service identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.service_id
    }

    /// Expose the service secret for use in an authorization header.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.service_secret.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_configured_values() {
        let creds = ServiceCredentials::new("mirror-svc", "s3cret");
        assert_eq!(creds.id(), "mirror-svc");
        assert_eq!(creds.secret(), "s3cret");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = ServiceCredentials::new("mirror-svc", "s3cret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("mirror-svc"));
        assert!(!debug.contains("s3cret"));
    }
}
