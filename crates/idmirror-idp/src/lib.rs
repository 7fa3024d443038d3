//! HTTP client for the remote identity provider.
//!
//! The identity provider is the system of record for users and groups; this
//! crate exposes it to the rest of the workspace as the [`IdentityService`]
//! trait. The concrete [`IdpClient`] speaks the provider's REST API:
//! OAuth2 token grants, `$skip`/`$top` paginated collection listings, and
//! per-id record lookups.

#![deny(missing_docs)]

mod client;
mod models;
mod pagination;

pub use client::{IdentityService, IdpClient, IdpClientBuilder};
pub use models::{
    AccessToken, GroupPage, Profile, ProfileEmail, RemoteGroup, RemoteUser, SshKey, SshKeyPage,
    UserPage,
};
pub use pagination::PageCursor;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = idmirror_core::Result<T>;
