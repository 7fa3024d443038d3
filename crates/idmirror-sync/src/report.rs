//! Cycle reporting types.

use chrono::{DateTime, Utc};
use idmirror_core::ids::CycleId;
use idmirror_core::Error;
use serde::Serialize;
use std::fmt;

/// Phases a reconciliation cycle moves through, in order.
///
/// Any unhandled error sends the cycle straight back to `Idle`; the next
/// scheduled tick restarts at `Authenticating`. There is no
/// resume-from-checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    /// No cycle in progress.
    Idle,
    /// Exchanging the service credentials for a bearer token.
    Authenticating,
    /// Paging remote groups into the store.
    LoadingGroups,
    /// Paging remote users into the store.
    LoadingUsers,
    /// Probing mirrored principals against the remote service.
    PurgingUsers,
    /// Probing mirrored groups against the remote service.
    PurgingGroups,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::LoadingGroups => "loading-groups",
            Self::LoadingUsers => "loading-users",
            Self::PurgingUsers => "purging-users",
            Self::PurgingGroups => "purging-groups",
        };
        f.write_str(name)
    }
}

/// The failure that ended or degraded a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleError {
    /// Phase the failure occurred in.
    pub phase: CyclePhase,
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl CycleError {
    /// Captures an error together with the phase it occurred in.
    #[must_use]
    pub fn new(phase: CyclePhase, error: &Error) -> Self {
        Self {
            phase,
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.phase, self.code, self.message)
    }
}

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Identifier correlating this cycle across log lines.
    pub cycle_id: CycleId,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// Groups upserted during the load phase.
    pub groups_loaded: u64,
    /// Users upserted during the load phase.
    pub users_loaded: u64,
    /// Stale principals removed.
    pub users_purged: u64,
    /// Stale groups removed.
    pub groups_purged: u64,
    /// First failure encountered, if any.
    pub error: Option<CycleError>,
}

impl CycleReport {
    /// True if the cycle completed every phase without error.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
