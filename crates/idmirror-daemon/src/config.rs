//! Daemon configuration loading.
//!
//! Settings come from a TOML file plus `IDMIRROR_*` environment variable
//! overrides, then pass through validation before anything connects
//! anywhere. Only recognized options exist; nothing in the core branches
//! on extra flags.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::Validate;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DaemonConfig {
    /// Remote identity provider settings.
    #[validate(nested)]
    pub identity: IdentitySection,

    /// Backing directory server settings.
    #[validate(nested)]
    pub directory: DirectorySection,

    /// Reconciliation settings.
    #[validate(nested)]
    #[serde(default)]
    pub sync: SyncSection,
}

/// Connection settings for the remote identity provider.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentitySection {
    /// REST API root, e.g. `https://hub.example.com/api/rest/`.
    #[validate(url)]
    pub base_url: String,

    /// Service credential id.
    pub service_id: String,

    /// Service credential secret.
    pub service_secret: String,
}

/// Connection settings for the backing directory server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DirectorySection {
    /// Directory server URL, e.g. `ldaps://localhost:10636`.
    #[validate(url)]
    pub url: String,

    /// Admin bind name.
    pub bind_dn: String,

    /// Admin bind password.
    pub bind_password: String,

    /// Root of the mirror tree, e.g. `dc=mirror`.
    pub root_dn: String,

    /// Whether to verify the directory server's TLS certificate.
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional custom CA certificate for TLS verification.
    #[serde(default)]
    pub tls_ca_cert: Option<PathBuf>,
}

/// Reconciliation cadence and paging.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SyncSection {
    /// Delay between the end of one cycle and the start of the next.
    #[validate(range(min = 5, max = 86400))]
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    /// Page size for remote collection listings.
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_period_secs() -> u64 {
    60
}

const fn default_page_size() -> u32 {
    10
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            page_size: default_page_size(),
        }
    }
}

impl DaemonConfig {
    /// Loads and validates configuration from a TOML file, with
    /// `IDMIRROR_*` environment variables layered on top.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("IDMIRROR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        let parsed: Self = settings
            .try_deserialize()
            .context("configuration has an invalid shape")?;
        parsed.validate().context("configuration failed validation")?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [identity]
        base_url = "https://hub.example.com/api/rest/"
        service_id = "mirror-svc"
        service_secret = "svc-secret"

        [directory]
        url = "ldap://localhost:10389"
        bind_dn = "uid=admin,ou=system"
        bind_password = "secret"
        root_dn = "dc=mirror"
    "#;

    fn parse(toml: &str) -> anyhow::Result<DaemonConfig> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let parsed: DaemonConfig = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    #[test]
    fn sample_config_parses_with_defaults() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.identity.service_id, "mirror-svc");
        assert_eq!(config.directory.root_dn, "dc=mirror");
        assert!(config.directory.tls_verify);
        assert_eq!(config.sync.period_secs, 60);
        assert_eq!(config.sync.page_size, 10);
    }

    #[test]
    fn out_of_range_page_size_is_rejected() {
        let toml = format!("{SAMPLE}\n[sync]\npage_size = 0\n");
        assert!(parse(&toml).is_err());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let toml = SAMPLE.replace("https://hub.example.com/api/rest/", "not a url");
        assert!(parse(&toml).is_err());
    }
}
