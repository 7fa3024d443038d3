//! Wire models for the identity provider's REST API.
//!
//! Shapes mirror the JSON the provider actually sends; accessor helpers
//! flatten the nested parts (profile email, transitive group ids) so the
//! reconciliation engine never digs through optional wrappers itself.

use idmirror_core::ids::{RemoteGroupId, RemoteUserId};
use serde::{Deserialize, Serialize};

/// Bearer token returned by the OAuth2 token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The raw token value.
    pub access_token: String,
}

impl AccessToken {
    /// Renders the token as an `Authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// A group record as the remote service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroup {
    /// Immutable remote identifier.
    pub id: RemoteGroupId,
    /// Display name; not guaranteed stable across syncs.
    pub name: String,
}

/// Email wrapper nested inside a user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEmail {
    /// The address itself.
    #[serde(default)]
    pub email: Option<String>,
}

/// User profile subrecord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Profile {
    /// Primary email, when set.
    #[serde(default)]
    pub email: Option<ProfileEmail>,
}

/// A user record as the remote service reports it.
///
/// Immutable from the mirror's point of view: the reconciliation engine
/// reads these and never writes anything back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    /// Immutable remote identifier (the staleness join key).
    pub id: RemoteUserId,
    /// Display name.
    pub name: String,
    /// Login name used for delegated authentication.
    pub login: String,
    /// Whether the account is banned remotely.
    #[serde(default)]
    pub banned: bool,
    /// Profile subrecord carrying the email address.
    #[serde(default)]
    pub profile: Option<Profile>,
    /// Groups the user belongs to, direct and inherited.
    #[serde(rename = "transitiveGroups", default)]
    pub groups: Vec<RemoteGroup>,
}

impl RemoteUser {
    /// Flattens the nested profile to the primary email address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.email.as_ref())
            .and_then(|email| email.email.as_deref())
    }

    /// Iterates over the ids of all groups the user belongs to.
    pub fn group_ids(&self) -> impl Iterator<Item = &RemoteGroupId> + '_ {
        self.groups.iter().map(|group| &group.id)
    }
}

/// A public SSH key attached to a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Key fingerprint.
    #[serde(rename = "fingerPrint", default)]
    pub finger_print: Option<String>,
    /// Key material in OpenSSH authorized_keys form.
    #[serde(rename = "openSshKey")]
    pub open_ssh_key: String,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Paged envelope for user listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    /// Offset the server applied.
    #[serde(default)]
    pub skip: u32,
    /// Page size the server applied.
    #[serde(default)]
    pub top: u32,
    /// Total number of records in the collection; may change between pages.
    pub total: u32,
    /// Records on this page.
    #[serde(default)]
    pub users: Vec<RemoteUser>,
}

/// Paged envelope for group listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPage {
    /// Offset the server applied.
    #[serde(default)]
    pub skip: u32,
    /// Page size the server applied.
    #[serde(default)]
    pub top: u32,
    /// Total number of records in the collection; may change between pages.
    pub total: u32,
    /// Records on this page.
    #[serde(rename = "usergroups", default)]
    pub groups: Vec<RemoteGroup>,
}

/// Paged envelope for SSH key listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyPage {
    /// Offset the server applied.
    #[serde(default)]
    pub skip: u32,
    /// Page size the server applied.
    #[serde(default)]
    pub top: u32,
    /// Total number of keys on the user.
    pub total: u32,
    /// Keys on this page.
    #[serde(rename = "sshpublickeys", default)]
    pub keys: Vec<SshKey>,
}
