//! LDAP-backed directory store.
//!
//! Materializes the mirror into an external LDAP server. The server has no
//! native full-replace update, so `upsert` is delete-then-add under the
//! admin session; a reader hitting the gap sees a brief absence, which the
//! store contract documents and accepts.

use crate::config::DirectoryConfig;
use crate::dn::Dn;
use crate::entry::Entry;
use crate::store::DirectoryStore;
use crate::Result;
use async_trait::async_trait;
use idmirror_core::Error;
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::warn;

/// LDAP result code: the named entry does not exist.
const RC_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code: the attribute value is already present.
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn add(&mut self, dn: &str, attributes: Vec<(String, HashSet<String>)>) -> Result<()>;
    /// Tolerates deleting an absent entry.
    async fn delete(&mut self, dn: &str) -> Result<()>;
    /// Tolerates adding an already-present value.
    async fn modify_add(&mut self, dn: &str, attribute: &str, value: &str) -> Result<()>;
    async fn search_subtree(
        &mut self,
        base: &str,
        filter: &str,
    ) -> Result<Vec<(String, HashMap<String, Vec<String>>)>>;
    async fn read_entry(
        &mut self,
        dn: &str,
    ) -> Result<Option<(String, HashMap<String, Vec<String>>)>>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory store backed by an external LDAP server via `ldap3`.
pub struct LdapDirectory {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
}

impl LdapDirectory {
    /// Creates a store that connects to the configured LDAP server.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self { config, connector }
    }

    #[cfg(test)]
    pub(crate) fn with_connector(config: DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    async fn admin_session(&self) -> Result<Box<dyn LdapSession>> {
        let mut session = self.connector.connect().await?;
        self.with_timeout(session.simple_bind(
            self.config.bind_dn().as_str(),
            self.config.bind_password(),
        ))
        .await?;
        Ok(session)
    }

    async fn with_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        timeout(self.config.operation_timeout(), fut)
            .await
            .map_err(|_| Error::Timeout("directory operation timed out".to_string()))?
    }

    fn to_add_attributes(entry: &Entry) -> Vec<(String, HashSet<String>)> {
        entry
            .attributes()
            .map(|(name, values)| (name.to_string(), values.iter().cloned().collect()))
            .collect()
    }

    fn from_raw(dn: &str, attributes: HashMap<String, Vec<String>>) -> Result<Entry> {
        let parsed = Dn::parse(dn)?;
        let mut entry = Entry::new(parsed);
        for (name, values) in attributes {
            for value in values {
                entry.add(name.clone(), value);
            }
        }
        Ok(entry)
    }
}

#[async_trait]
impl DirectoryStore for LdapDirectory {
    async fn upsert(&self, entry: Entry) -> Result<()> {
        let mut session = self.admin_session().await?;
        let dn = entry.dn().as_str().to_string();
        let attributes = Self::to_add_attributes(&entry);

        // The backend has no replace-entry primitive.
        self.with_timeout(session.delete(&dn)).await?;
        self.with_timeout(session.add(&dn, attributes)).await?;
        session.unbind().await?;
        Ok(())
    }

    async fn delete(&self, dn: &Dn) -> Result<()> {
        let mut session = self.admin_session().await?;
        self.with_timeout(session.delete(dn.as_str())).await?;
        session.unbind().await?;
        Ok(())
    }

    async fn find_by_object_class(&self, object_class: &str) -> Result<Vec<Entry>> {
        let mut session = self.admin_session().await?;
        let filter = format!("(objectClass={object_class})");
        let raw = self
            .with_timeout(session.search_subtree(self.config.root_dn().as_str(), &filter))
            .await?;
        session.unbind().await?;

        Ok(raw
            .into_iter()
            .filter_map(|(dn, attributes)| match Self::from_raw(&dn, attributes) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Failed to parse entry at `{dn}`: {err}");
                    None
                }
            })
            .collect())
    }

    async fn append_attribute(&self, dn: &Dn, attribute: &str, value: &str) -> Result<()> {
        let mut session = self.admin_session().await?;
        self.with_timeout(session.modify_add(dn.as_str(), attribute, value))
            .await?;
        session.unbind().await?;
        Ok(())
    }

    async fn lookup(&self, dn: &Dn) -> Result<Option<Entry>> {
        let mut session = self.admin_session().await?;
        let raw = self.with_timeout(session.read_entry(dn.as_str())).await?;
        session.unbind().await?;

        raw.map(|(dn, attributes)| Self::from_raw(&dn, attributes))
            .transpose()
    }
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession { inner: ldap }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = self
            .inner
            .simple_bind(dn, password)
            .await
            .map_err(map_ldap_error)?;
        ensure_success(&result, &[])
    }

    async fn add(&mut self, dn: &str, attributes: Vec<(String, HashSet<String>)>) -> Result<()> {
        let result = self.inner.add(dn, attributes).await.map_err(map_ldap_error)?;
        ensure_success(&result, &[])
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let result = self.inner.delete(dn).await.map_err(map_ldap_error)?;
        ensure_success(&result, &[RC_NO_SUCH_OBJECT])
    }

    async fn modify_add(&mut self, dn: &str, attribute: &str, value: &str) -> Result<()> {
        let mods = vec![Mod::Add(
            attribute.to_string(),
            HashSet::from([value.to_string()]),
        )];
        let result = self.inner.modify(dn, mods).await.map_err(map_ldap_error)?;
        ensure_success(&result, &[RC_ATTRIBUTE_OR_VALUE_EXISTS])
    }

    async fn search_subtree(
        &mut self,
        base: &str,
        filter: &str,
    ) -> Result<Vec<(String, HashMap<String, Vec<String>>)>> {
        let result = self
            .inner
            .search(base, Scope::Subtree, filter, vec!["*"])
            .await
            .map_err(map_ldap_error)?;
        let (entries, _) = result.success().map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| (entry.dn, entry.attrs))
            .collect())
    }

    async fn read_entry(
        &mut self,
        dn: &str,
    ) -> Result<Option<(String, HashMap<String, Vec<String>>)>> {
        let result = self
            .inner
            .search(dn, Scope::Base, "(objectClass=*)", vec!["*"])
            .await
            .map_err(map_ldap_error)?;

        if result.1.rc == RC_NO_SUCH_OBJECT {
            return Ok(None);
        }
        let (entries, _) = result.success().map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| (entry.dn, entry.attrs))
            .next())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.inner.unbind().await.map_err(map_ldap_error)?;
        Ok(())
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read directory CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid directory CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to load directory CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    Error::ExternalServiceError {
        service: "directory".to_string(),
        message: err.to_string(),
    }
}

fn ensure_success(result: &ldap3::LdapResult, tolerated: &[u32]) -> Result<()> {
    if result.rc == 0 || tolerated.contains(&result.rc) {
        Ok(())
    } else {
        Err(Error::ExternalServiceError {
            service: "directory".to_string(),
            message: format!("result code {}: {}", result.rc, result.text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{group_entry, MirrorLayout, ATTR_MEMBER, OC_GROUP};

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new(
            "ldap://directory.example.com:10389",
            Dn::parse("uid=admin,ou=system").unwrap(),
            "secret",
            Dn::parse("dc=mirror").unwrap(),
        )
        .unwrap()
    }

    fn layout() -> MirrorLayout {
        MirrorLayout::new(Dn::parse("dc=mirror").unwrap())
    }

    #[tokio::test]
    async fn upsert_deletes_then_adds() {
        let mut connector = MockLdapConnector::new();
        let mut session = MockLdapSession::new();
        let mut sequence = mockall::Sequence::new();

        session
            .expect_simple_bind()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        session
            .expect_delete()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|dn| dn == "cn=devs,ou=Groups,dc=mirror")
            .returning(|_| Ok(()));
        session
            .expect_add()
            .times(1)
            .in_sequence(&mut sequence)
            .withf(|dn, attrs| {
                dn == "cn=devs,ou=Groups,dc=mirror"
                    && attrs.iter().any(|(name, _)| name == "description")
            })
            .returning(|_, _| Ok(()));
        session
            .expect_unbind()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));

        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let store = LdapDirectory::with_connector(sample_config(), Box::new(connector));
        store
            .upsert(group_entry(&layout(), "devs", "g-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn find_parses_raw_entries() {
        let mut connector = MockLdapConnector::new();
        let mut session = MockLdapSession::new();
        session.expect_simple_bind().returning(|_, _| Ok(()));
        session.expect_search_subtree().returning(|_, filter| {
            assert_eq!(filter, "(objectClass=groupOfNames)");
            let mut attrs = HashMap::new();
            attrs.insert("objectClass".to_string(), vec!["groupOfNames".to_string()]);
            attrs.insert("description".to_string(), vec!["g-1".to_string()]);
            Ok(vec![("cn=devs,ou=Groups,dc=mirror".to_string(), attrs)])
        });
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let store = LdapDirectory::with_connector(sample_config(), Box::new(connector));
        let entries = store.find_by_object_class(OC_GROUP).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].first("description"), Some("g-1"));
    }

    #[tokio::test]
    async fn append_attribute_uses_modify_add() {
        let mut connector = MockLdapConnector::new();
        let mut session = MockLdapSession::new();
        session.expect_simple_bind().returning(|_, _| Ok(()));
        session
            .expect_modify_add()
            .withf(|dn, attribute, value| {
                dn == "cn=devs,ou=Groups,dc=mirror"
                    && attribute == ATTR_MEMBER
                    && value == "cn=jane,ou=Users,dc=mirror"
            })
            .returning(|_, _, _| Ok(()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_connect()
            .return_once(move || Ok(Box::new(session)));

        let store = LdapDirectory::with_connector(sample_config(), Box::new(connector));
        store
            .append_attribute(
                &Dn::parse("cn=devs,ou=Groups,dc=mirror").unwrap(),
                ATTR_MEMBER,
                "cn=jane,ou=Users,dc=mirror",
            )
            .await
            .unwrap();
    }

    #[test]
    fn tolerated_result_codes() {
        let ok = ldap3::LdapResult {
            rc: 32,
            matched: String::new(),
            text: String::new(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        };
        assert!(ensure_success(&ok, &[RC_NO_SUCH_OBJECT]).is_ok());
        assert!(ensure_success(&ok, &[]).is_err());
    }
}
