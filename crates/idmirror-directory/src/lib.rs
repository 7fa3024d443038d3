//! Directory store boundary for the mirror tree.
//!
//! The mirror materializes remote users and groups as directory entries
//! under `ou=Users,<root>` and `ou=Groups,<root>`. This crate provides the
//! naming and entry primitives, the [`DirectoryStore`] capability trait the
//! reconciliation engine writes through, and two implementations: an
//! in-memory store (tests, embedded protocol engines) and an `ldap3`-backed
//! store that materializes the mirror into an external LDAP server.

#![deny(missing_docs)]

mod config;
mod dn;
mod entry;
mod ldap;
mod memory;
mod schema;
mod store;

pub use config::{
    DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS,
};
pub use dn::{Dn, DnError, Rdn};
pub use entry::Entry;
pub use ldap::LdapDirectory;
pub use memory::MemoryDirectory;
pub use schema::{
    group_entry, principal_entry, MirrorLayout, ATTR_CN, ATTR_DESCRIPTION, ATTR_MAIL, ATTR_MEMBER,
    ATTR_MEMBER_OF, ATTR_OBJECT_CLASS, ATTR_SN, ATTR_SSH_PUBLIC_KEY, ATTR_UID, OC_GROUP, OC_PERSON,
};
pub use store::DirectoryStore;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = idmirror_core::Result<T>;
