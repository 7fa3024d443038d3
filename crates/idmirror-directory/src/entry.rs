//! Attribute-set entry model.

use crate::dn::Dn;
use std::collections::{BTreeMap, BTreeSet};

/// A directory entry: a name plus a map of attribute value sets.
///
/// Values are sets, matching directory semantics: appending a value that is
/// already present is a no-op, and attribute order is irrelevant to
/// equality. This is what makes reconciliation idempotent by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    attributes: BTreeMap<String, BTreeSet<String>>,
}

impl Entry {
    /// Creates an empty entry at the given name.
    #[must_use]
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: BTreeMap::new(),
        }
    }

    /// The entry's distinguished name.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Builder-style attribute insertion.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(attribute, value);
        self
    }

    /// Adds a value to an attribute, creating the attribute if absent.
    pub fn add(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .insert(value.into());
    }

    /// Returns the first value of the attribute, if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.iter().next().map(String::as_str))
    }

    /// Returns all values of the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&BTreeSet<String>> {
        self.attributes.get(attribute)
    }

    /// True if the attribute carries the given value.
    #[must_use]
    pub fn has_value(&self, attribute: &str, value: &str) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|values| values.contains(value))
    }

    /// True if the entry carries the given object class (case-insensitive).
    #[must_use]
    pub fn has_object_class(&self, object_class: &str) -> bool {
        self.attributes
            .get(crate::schema::ATTR_OBJECT_CLASS)
            .is_some_and(|values| {
                values
                    .iter()
                    .any(|value| value.eq_ignore_ascii_case(object_class))
            })
    }

    /// Iterates over `(attribute, values)` pairs in attribute order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> + '_ {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ATTR_OBJECT_CLASS;

    fn sample() -> Entry {
        Entry::new(Dn::parse("cn=jane,ou=Users,dc=mirror").unwrap())
            .with_attribute(ATTR_OBJECT_CLASS, "person")
            .with_attribute(ATTR_OBJECT_CLASS, "top")
            .with_attribute("uid", "jane")
    }

    #[test]
    fn add_is_set_semantics() {
        let mut entry = sample();
        entry.add("uid", "jane");
        assert_eq!(entry.values("uid").unwrap().len(), 1);
    }

    #[test]
    fn object_class_check_ignores_case() {
        let entry = sample();
        assert!(entry.has_object_class("Person"));
        assert!(entry.has_object_class("TOP"));
        assert!(!entry.has_object_class("groupOfNames"));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Entry::new(Dn::parse("cn=g,dc=mirror").unwrap())
            .with_attribute("member", "cn=a,dc=mirror")
            .with_attribute("member", "cn=b,dc=mirror");
        let b = Entry::new(Dn::parse("cn=g,dc=mirror").unwrap())
            .with_attribute("member", "cn=b,dc=mirror")
            .with_attribute("member", "cn=a,dc=mirror");
        assert_eq!(a, b);
    }

    #[test]
    fn first_and_has_value() {
        let entry = sample();
        assert_eq!(entry.first("uid"), Some("jane"));
        assert!(entry.has_value("uid", "jane"));
        assert!(!entry.has_value("uid", "john"));
        assert_eq!(entry.first("mail"), None);
    }
}
