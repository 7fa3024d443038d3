//! # idmirror-core
//!
//! Core types and utilities shared across the idmirror workspace.
//!
//! idmirror materializes users and groups from a remote identity provider
//! into an LDAP-style directory and delegates bind authentication back to
//! the provider. This crate provides the pieces every other crate leans on:
//!
//! - [`error`] - Error taxonomy and conversions from transport errors
//! - [`ids`] - Strongly-typed identifiers for remote records and sync cycles
//! - [`client`] - HTTP client settings and retry policies
//! - [`credentials`] - Service credential pair used against the remote API

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod credentials;
pub mod error;
pub mod ids;

// Re-export commonly used types
pub use error::{Error, Result};
