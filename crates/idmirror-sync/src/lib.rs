//! Reconciliation engine and authentication bridge.
//!
//! The two pieces with real behavior in the mirror:
//!
//! - [`ReconciliationEngine`] runs full sync cycles: load every remote
//!   group and user into the directory store, then purge entries whose
//!   remote counterpart is gone. One cycle at a time, driven by
//!   [`run_sync_loop`].
//! - [`AuthBridge`] answers bind attempts by checking the presented
//!   credential against the remote service. It implements [`BindHandler`],
//!   the callback a directory protocol engine registers at startup.
//!
//! Neither piece lets an error escape its public contract: a cycle folds
//! every failure into its [`CycleReport`], and a bind failure of any kind
//! collapses to [`BindOutcome::Denied`].

#![deny(missing_docs)]

mod auth;
mod engine;
mod report;
mod scheduler;

pub use auth::{AuthBridge, AuthLevel, BindHandler, BindOutcome, BoundPrincipal};
pub use engine::{GroupIndex, ReconciliationEngine};
pub use report::{CycleError, CyclePhase, CycleReport};
pub use scheduler::run_sync_loop;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = idmirror_core::Result<T>;
