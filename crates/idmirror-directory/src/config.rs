//! Configuration for the LDAP-backed store.

use crate::dn::Dn;
use crate::Result;
use idmirror_core::Error;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 =
    idmirror_core::client::DIRECTORY_DEFAULT_TIMEOUT;

/// Configuration for connecting to the backing directory server.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    url: String,
    bind_dn: Dn,
    bind_password: SecretString,
    root_dn: Dn,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided URL is invalid.
    pub fn new(
        url: impl Into<String>,
        bind_dn: Dn,
        bind_password: impl Into<String>,
        root_dn: Dn,
    ) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)
            .map_err(|err| Error::ConfigError(format!("invalid directory URL: {err}")))?;

        Ok(Self {
            url: url_string,
            bind_dn,
            bind_password: SecretString::from(bind_password.into()),
            root_dn,
            tls_verify: true,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        })
    }

    /// Returns the directory endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the admin bind name.
    #[must_use]
    pub const fn bind_dn(&self) -> &Dn {
        &self.bind_dn
    }

    /// Exposes the admin bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }

    /// Returns the mirror root name.
    #[must_use]
    pub const fn root_dn(&self) -> &Dn {
        &self.root_dn
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets a custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides() {
        let config = DirectoryConfig::new(
            "ldaps://directory.example.com",
            Dn::parse("uid=admin,ou=system").unwrap(),
            "secret",
            Dn::parse("dc=mirror").unwrap(),
        )
        .unwrap()
        .with_connection_timeout_secs(20)
        .with_operation_timeout_secs(30)
        .with_tls_verification(false);

        assert_eq!(config.url(), "ldaps://directory.example.com");
        assert_eq!(config.bind_dn().as_str(), "uid=admin,ou=system");
        assert_eq!(config.bind_password(), "secret");
        assert_eq!(config.root_dn().as_str(), "dc=mirror");
        assert_eq!(config.connection_timeout(), Duration::from_secs(20));
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert!(!config.tls_verify());
    }

    #[test]
    fn rejects_invalid_url() {
        let result = DirectoryConfig::new(
            "not a url",
            Dn::parse("uid=admin,ou=system").unwrap(),
            "secret",
            Dn::parse("dc=mirror").unwrap(),
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
