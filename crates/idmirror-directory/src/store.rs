//! The directory store capability trait.

use crate::dn::Dn;
use crate::entry::Entry;
use crate::Result;
use async_trait::async_trait;

/// Write/read access to the mirrored directory.
///
/// The reconciliation engine is the only writer; the authentication bridge
/// and administrative queries only read. Implementations must tolerate
/// concurrent readers during a write pass — a reader may observe the brief
/// absence window while `upsert` replaces an entry.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Creates or fully replaces the entry at its name.
    ///
    /// Replace semantics: the stored attribute sets afterwards are exactly
    /// the given entry's, never a merge with what was there before.
    async fn upsert(&self, entry: Entry) -> Result<()>;

    /// Deletes the entry at the given name. Deleting an absent entry is a
    /// no-op, so purge passes can be retried safely.
    async fn delete(&self, dn: &Dn) -> Result<()>;

    /// Returns all entries carrying the given object class.
    async fn find_by_object_class(&self, object_class: &str) -> Result<Vec<Entry>>;

    /// Adds a value to an attribute of an existing entry.
    ///
    /// Adding a value that is already present is a no-op.
    async fn append_attribute(&self, dn: &Dn, attribute: &str, value: &str) -> Result<()>;

    /// Fetches a single entry by name.
    async fn lookup(&self, dn: &Dn) -> Result<Option<Entry>>;
}
