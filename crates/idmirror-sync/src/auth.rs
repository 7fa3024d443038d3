//! The authentication bridge.
//!
//! A bind presents an identity and a credential; the bridge checks the
//! credential against the remote service and answers with exactly two
//! outcomes. Bad password, unreachable remote, and malformed response all
//! collapse to [`BindOutcome::Denied`] so the bind channel cannot be used
//! to probe remote availability. The underlying cause is still logged.

use idmirror_directory::Dn;
use idmirror_idp::IdentityService;
use secrecy::SecretString;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

/// Authentication strength of an approved bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    /// No authentication (anonymous bind). Never produced by the bridge.
    None,
    /// Simple password authentication.
    Simple,
    /// Strong (certificate-based) authentication. Never produced by the
    /// bridge.
    Strong,
}

/// The caller identity an approved bind is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPrincipal {
    /// The bind identity as presented.
    pub dn: Dn,
    /// Login name extracted from the bind identity.
    pub login: String,
    /// Authentication level granted.
    pub level: AuthLevel,
}

/// Outcome of a bind attempt.
///
/// Deliberately carries no failure detail: every failing sub-case is the
/// same `Denied` to the protocol caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The credential checked out remotely.
    Approved(BoundPrincipal),
    /// The bind was rejected.
    Denied,
}

/// Protocol-facing authentication callback.
///
/// The directory protocol engine registers one handler at startup and
/// invokes it for every inbound simple bind, potentially from many tasks
/// at once and concurrently with a running reconciliation cycle.
#[async_trait]
pub trait BindHandler: Send + Sync {
    /// Decides a bind attempt.
    async fn handle_bind(&self, bind_dn: &Dn, credential: &SecretString) -> BindOutcome;
}

/// Bind handler that delegates credential checks to the remote service.
pub struct AuthBridge {
    identity: Arc<dyn IdentityService>,
}

impl AuthBridge {
    /// Creates a bridge over the given identity service.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl BindHandler for AuthBridge {
    async fn handle_bind(&self, bind_dn: &Dn, credential: &SecretString) -> BindOutcome {
        // The leading naming component carries the claimed login
        // (`uid=alice,...` or `cn=alice,...`). Reading it from the bind
        // identity itself avoids any dependency on a prior sync.
        let login = bind_dn.leading().value();

        match self.identity.user_login(login, credential).await {
            Ok(_) => {
                info!(login, "bind approved");
                BindOutcome::Approved(BoundPrincipal {
                    dn: bind_dn.clone(),
                    login: login.to_string(),
                    level: AuthLevel::Simple,
                })
            }
            Err(err) => {
                debug!(login, error = %err, "bind denied");
                BindOutcome::Denied
            }
        }
    }
}
