//! Mirror tree layout and entry construction.
//!
//! The attribute layout is fixed: principals live under `ou=Users,<root>`,
//! groups under `ou=Groups,<root>`, and both carry the immutable remote id
//! in `description`. The display name keys the entry (`cn=...`) but the id
//! is the join key — display names are not stable across syncs.

use crate::dn::Dn;
use crate::entry::Entry;

/// Attribute holding the entry's object classes.
pub const ATTR_OBJECT_CLASS: &str = "objectClass";
/// Common-name attribute (entry key under its base).
pub const ATTR_CN: &str = "cn";
/// Surname attribute, required by the person classes.
pub const ATTR_SN: &str = "sn";
/// Login attribute on principals.
pub const ATTR_UID: &str = "uid";
/// Email attribute on principals.
pub const ATTR_MAIL: &str = "mail";
/// Attribute carrying the immutable remote id (the staleness join key).
pub const ATTR_DESCRIPTION: &str = "description";
/// Forward membership attribute on groups.
pub const ATTR_MEMBER: &str = "member";
/// Back-reference membership attribute on principals.
pub const ATTR_MEMBER_OF: &str = "memberOf";
/// Public SSH key attribute on principals.
pub const ATTR_SSH_PUBLIC_KEY: &str = "sshPublicKey";

/// Object class identifying mirrored principals in searches.
pub const OC_PERSON: &str = "person";
/// Object class identifying mirrored groups in searches.
pub const OC_GROUP: &str = "groupOfNames";

const PERSON_CLASSES: [&str; 4] = ["top", "person", "organizationalPerson", "inetOrgPerson"];
const GROUP_CLASSES: [&str; 2] = ["top", OC_GROUP];
const UNIT_CLASSES: [&str; 2] = ["top", "organizationalUnit"];
const DOMAIN_CLASSES: [&str; 2] = ["top", "domain"];

/// Fixed shape of the mirror tree beneath a configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    root: Dn,
    users_base: Dn,
    groups_base: Dn,
}

impl MirrorLayout {
    /// Builds the layout beneath the given root name.
    #[must_use]
    pub fn new(root: Dn) -> Self {
        let users_base = root.child("ou", "Users");
        let groups_base = root.child("ou", "Groups");
        Self {
            root,
            users_base,
            groups_base,
        }
    }

    /// The configured root name.
    #[must_use]
    pub fn root(&self) -> &Dn {
        &self.root
    }

    /// Base name of the principal subtree.
    #[must_use]
    pub fn users_base(&self) -> &Dn {
        &self.users_base
    }

    /// Base name of the group subtree.
    #[must_use]
    pub fn groups_base(&self) -> &Dn {
        &self.groups_base
    }

    /// Name of the principal entry for a display name.
    #[must_use]
    pub fn principal_dn(&self, name: &str) -> Dn {
        self.users_base.child(ATTR_CN, name)
    }

    /// Name of the group entry for a display name.
    #[must_use]
    pub fn group_dn(&self, name: &str) -> Dn {
        self.groups_base.child(ATTR_CN, name)
    }

    /// Structural entries the tree needs before any mirrored data lands:
    /// the root domain entry and the two organizational units.
    #[must_use]
    pub fn scaffold(&self) -> Vec<Entry> {
        let mut root_entry = Entry::new(self.root.clone());
        for class in DOMAIN_CLASSES {
            root_entry.add(ATTR_OBJECT_CLASS, class);
        }
        let leading = self.root.leading();
        root_entry.add(leading.attribute(), leading.value());

        let mut entries = vec![root_entry];
        for base in [&self.users_base, &self.groups_base] {
            let mut unit = Entry::new(base.clone());
            for class in UNIT_CLASSES {
                unit.add(ATTR_OBJECT_CLASS, class);
            }
            unit.add("ou", base.leading().value());
            entries.push(unit);
        }
        entries
    }
}

/// Builds a mirrored principal entry.
///
/// `member_of` carries the group names resolved in the same cycle; a group
/// the cycle has not materialized yet is simply absent here.
#[must_use]
pub fn principal_entry(
    layout: &MirrorLayout,
    name: &str,
    remote_id: &str,
    login: &str,
    email: Option<&str>,
    member_of: &[Dn],
    ssh_keys: &[String],
) -> Entry {
    let mut entry = Entry::new(layout.principal_dn(name));
    for class in PERSON_CLASSES {
        entry.add(ATTR_OBJECT_CLASS, class);
    }
    entry.add(ATTR_CN, name);
    entry.add(ATTR_SN, "");
    entry.add(ATTR_UID, login);
    entry.add(ATTR_MAIL, email.unwrap_or(""));
    entry.add(ATTR_DESCRIPTION, remote_id);
    for group_dn in member_of {
        entry.add(ATTR_MEMBER_OF, group_dn.as_str());
    }
    for key in ssh_keys {
        entry.add(ATTR_SSH_PUBLIC_KEY, key.as_str());
    }
    entry
}

/// Builds a mirrored group entry.
///
/// The member set is seeded with the root name because `groupOfNames`
/// requires at least one member value; real members are appended as
/// referencing principals materialize.
#[must_use]
pub fn group_entry(layout: &MirrorLayout, name: &str, remote_id: &str) -> Entry {
    let mut entry = Entry::new(layout.group_dn(name));
    for class in GROUP_CLASSES {
        entry.add(ATTR_OBJECT_CLASS, class);
    }
    entry.add(ATTR_CN, name);
    entry.add(ATTR_DESCRIPTION, remote_id);
    entry.add(ATTR_MEMBER, layout.root().as_str());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> MirrorLayout {
        MirrorLayout::new(Dn::parse("dc=mirror").unwrap())
    }

    #[test]
    fn layout_names() {
        let layout = layout();
        assert_eq!(layout.users_base().as_str(), "ou=Users,dc=mirror");
        assert_eq!(layout.groups_base().as_str(), "ou=Groups,dc=mirror");
        assert_eq!(
            layout.principal_dn("Jane Doe").as_str(),
            "cn=Jane Doe,ou=Users,dc=mirror"
        );
        assert_eq!(
            layout.group_dn("devs").as_str(),
            "cn=devs,ou=Groups,dc=mirror"
        );
    }

    #[test]
    fn principal_entry_carries_join_key_and_memberships() {
        let layout = layout();
        let group_dn = layout.group_dn("devs");
        let entry = principal_entry(
            &layout,
            "Jane Doe",
            "u-1",
            "jane",
            Some("jane@example.com"),
            &[group_dn.clone()],
            &["ssh-ed25519 AAAA".to_string()],
        );

        assert!(entry.has_object_class(OC_PERSON));
        assert_eq!(entry.first(ATTR_DESCRIPTION), Some("u-1"));
        assert_eq!(entry.first(ATTR_UID), Some("jane"));
        assert_eq!(entry.first(ATTR_MAIL), Some("jane@example.com"));
        assert!(entry.has_value(ATTR_MEMBER_OF, group_dn.as_str()));
        assert!(entry.has_value(ATTR_SSH_PUBLIC_KEY, "ssh-ed25519 AAAA"));
    }

    #[test]
    fn principal_entry_blanks_missing_email() {
        let entry = principal_entry(&layout(), "Ghost", "u-2", "ghost", None, &[], &[]);
        assert_eq!(entry.first(ATTR_MAIL), Some(""));
    }

    #[test]
    fn group_entry_has_placeholder_member() {
        let layout = layout();
        let entry = group_entry(&layout, "devs", "g-1");
        assert!(entry.has_object_class(OC_GROUP));
        assert_eq!(entry.first(ATTR_DESCRIPTION), Some("g-1"));
        assert!(entry.has_value(ATTR_MEMBER, "dc=mirror"));
    }

    #[test]
    fn scaffold_builds_root_and_units() {
        let entries = layout().scaffold();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].has_object_class("domain"));
        assert_eq!(entries[1].first("ou"), Some("Users"));
        assert_eq!(entries[2].first("ou"), Some("Groups"));
    }
}
