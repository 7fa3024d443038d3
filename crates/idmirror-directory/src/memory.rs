//! In-memory directory store.

use crate::dn::Dn;
use crate::entry::Entry;
use crate::store::DirectoryStore;
use crate::Result;
use async_trait::async_trait;
use idmirror_core::Error;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Directory store backed by a process-local map.
///
/// Used by tests as the substitute for a real directory backend, and
/// suitable as the entry storage of an embedded protocol engine. Reads
/// proceed concurrently; writes take the lock briefly per operation, so a
/// reconciliation pass never blocks readers for the whole cycle.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryDirectory {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let map = entries
            .into_iter()
            .map(|entry| (Self::key(entry.dn()), entry))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    fn key(dn: &Dn) -> String {
        dn.as_str().to_ascii_lowercase()
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn upsert(&self, entry: Entry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(Self::key(entry.dn()), entry);
        Ok(())
    }

    async fn delete(&self, dn: &Dn) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&Self::key(dn));
        Ok(())
    }

    async fn find_by_object_class(&self, object_class: &str) -> Result<Vec<Entry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|entry| entry.has_object_class(object_class))
            .cloned()
            .collect())
    }

    async fn append_attribute(&self, dn: &Dn, attribute: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&Self::key(dn))
            .ok_or_else(|| Error::NotFound(format!("no entry at `{dn}`")))?;
        entry.add(attribute, value);
        Ok(())
    }

    async fn lookup(&self, dn: &Dn) -> Result<Option<Entry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&Self::key(dn)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ATTR_MEMBER, ATTR_OBJECT_CLASS, OC_GROUP};

    fn group(name: &str) -> Entry {
        Entry::new(Dn::parse(format!("cn={name},ou=Groups,dc=mirror")).unwrap())
            .with_attribute(ATTR_OBJECT_CLASS, OC_GROUP)
            .with_attribute("cn", name)
    }

    #[tokio::test]
    async fn upsert_replaces_not_merges() {
        let store = MemoryDirectory::new();
        let dn = Dn::parse("cn=devs,ou=Groups,dc=mirror").unwrap();

        store
            .upsert(group("devs").with_attribute(ATTR_MEMBER, "cn=old,dc=mirror"))
            .await
            .unwrap();
        store.upsert(group("devs")).await.unwrap();

        let entry = store.lookup(&dn).await.unwrap().unwrap();
        assert!(entry.values(ATTR_MEMBER).is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let store = MemoryDirectory::new();
        let dn = Dn::parse("cn=ghost,ou=Users,dc=mirror").unwrap();
        store.delete(&dn).await.unwrap();
    }

    #[tokio::test]
    async fn append_to_missing_entry_is_not_found() {
        let store = MemoryDirectory::new();
        let dn = Dn::parse("cn=ghost,ou=Groups,dc=mirror").unwrap();
        let err = store
            .append_attribute(&dn, ATTR_MEMBER, "cn=jane,dc=mirror")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn find_filters_by_object_class() {
        let store = MemoryDirectory::with_entries([group("devs"), group("ops")]);
        let groups = store.find_by_object_class(OC_GROUP).await.unwrap();
        assert_eq!(groups.len(), 2);
        let people = store.find_by_object_class("person").await.unwrap();
        assert!(people.is_empty());
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_on_names() {
        let store = MemoryDirectory::with_entries([group("devs")]);
        let dn = Dn::parse("CN=Devs,OU=groups,DC=mirror").unwrap();
        assert!(store.lookup(&dn).await.unwrap().is_some());
    }
}
