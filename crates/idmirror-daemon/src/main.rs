//! Directory mirror daemon.
//!
//! Wires the identity client, the LDAP-backed store, and the
//! reconciliation engine together, then runs sync cycles on a fixed delay
//! until interrupted. The directory protocol engine itself (listener,
//! entry serving, TLS) is an external component; embedders that also serve
//! binds construct an [`idmirror_sync::AuthBridge`] over the same identity
//! client and register it as their bind callback.

mod config;

use crate::config::DaemonConfig;
use anyhow::Context;
use idmirror_core::credentials::ServiceCredentials;
use idmirror_directory::{DirectoryConfig, DirectoryStore, Dn, LdapDirectory, MirrorLayout};
use idmirror_idp::{IdentityService, IdpClient};
use idmirror_sync::{run_sync_loop, ReconciliationEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "idmirror.toml".to_string());
    let config = DaemonConfig::load(Path::new(&config_path))?;

    let credentials = ServiceCredentials::new(
        config.identity.service_id.as_str(),
        config.identity.service_secret.as_str(),
    );
    let identity: Arc<dyn IdentityService> = Arc::new(
        IdpClient::new(&config.identity.base_url, credentials)
            .context("failed to construct identity API client")?,
    );

    let root_dn = Dn::parse(&config.directory.root_dn)
        .context("directory.root_dn is not a valid distinguished name")?;
    let bind_dn = Dn::parse(&config.directory.bind_dn)
        .context("directory.bind_dn is not a valid distinguished name")?;

    let mut directory_config = DirectoryConfig::new(
        &config.directory.url,
        bind_dn,
        config.directory.bind_password.as_str(),
        root_dn.clone(),
    )?
    .with_tls_verification(config.directory.tls_verify);
    if let Some(ca_cert) = &config.directory.tls_ca_cert {
        directory_config = directory_config.with_tls_ca_cert(ca_cert.clone());
    }

    let store: Arc<dyn DirectoryStore> = Arc::new(LdapDirectory::new(directory_config));
    let layout = MirrorLayout::new(root_dn);
    ensure_scaffold(store.as_ref(), &layout).await?;

    let engine = Arc::new(ReconciliationEngine::new(
        identity,
        store,
        layout,
        config.sync.page_size,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_loop = tokio::spawn(run_sync_loop(
        engine,
        Duration::from_secs(config.sync.period_secs),
        shutdown_rx,
    ));

    info!(period_secs = config.sync.period_secs, "mirror daemon started");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    shutdown_tx
        .send(true)
        .context("sync loop stopped unexpectedly")?;
    sync_loop.await.context("sync loop panicked")?;
    Ok(())
}

/// Creates the mirror tree's structural entries if they are missing.
///
/// Existing entries are left untouched: replacing a non-leaf entry is not
/// possible on an LDAP backend, and the scaffold never changes shape.
async fn ensure_scaffold(store: &dyn DirectoryStore, layout: &MirrorLayout) -> anyhow::Result<()> {
    for entry in layout.scaffold() {
        if store.lookup(entry.dn()).await?.is_none() {
            info!(dn = %entry.dn(), "creating mirror tree entry");
            store.upsert(entry).await?;
        }
    }
    Ok(())
}
