//! Strongly-typed identifiers.
//!
//! Remote record identifiers are opaque strings assigned by the identity
//! provider — they are stable across renames, which is exactly why the
//! mirror stores them as the staleness join key. Wrapping them prevents
//! user/group id mix-ups at compile time. Cycle identifiers are UUIDs
//! minted locally to correlate one reconciliation pass across log lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate opaque string identifier types.
macro_rules! remote_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from its string form.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrows the identifier string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

remote_id_type!(RemoteUserId, "Identifier of a user record on the remote identity service.");
remote_id_type!(RemoteGroupId, "Identifier of a group record on the remote identity service.");

/// Identifier of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    /// Mints a fresh cycle identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner [`Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn remote_ids_are_distinct_types() {
        let user = RemoteUserId::new("1b3c-77");
        let group = RemoteGroupId::new("1b3c-77");
        assert_eq!(user.as_str(), group.as_str());
        // Compile-time distinction is the point; the string forms may collide.
    }

    #[test]
    fn remote_id_round_trips_through_serde() {
        let id = RemoteUserId::new("af-9");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"af-9\"");
        let back: RemoteUserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn remote_group_id_works_as_map_key() {
        let mut index = HashMap::new();
        index.insert(RemoteGroupId::new("g1"), "cn=devs");
        assert_eq!(index.get(&RemoteGroupId::from("g1")), Some(&"cn=devs"));
    }

    #[test]
    fn cycle_ids_are_unique() {
        assert_ne!(CycleId::new(), CycleId::new());
    }

    #[test]
    fn display_matches_inner() {
        let id = RemoteUserId::new("u-42");
        assert_eq!(id.to_string(), "u-42");
    }
}
