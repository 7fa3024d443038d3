//! Fixed-delay scheduling of reconciliation cycles.

use crate::engine::ReconciliationEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// Runs reconciliation cycles until told to stop.
///
/// The first cycle starts immediately; each subsequent cycle starts one
/// `period` after the previous cycle *finished* (fixed delay, not fixed
/// rate), so cycles can never overlap and a slow remote stretches the
/// schedule instead of stacking work. A failed cycle is not retried early;
/// the next tick simply starts over from scratch.
///
/// `shutdown` is a watch channel; sending `true` (or dropping the sender)
/// stops the loop at the next opportunity between cycles.
pub async fn run_sync_loop(
    engine: Arc<ReconciliationEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let report = engine.run_cycle().await;
        if let Some(error) = &report.error {
            warn!(cycle = %report.cycle_id, %error, "cycle finished with error");
        }

        let delay = sleep(period);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                () = &mut delay => break,
                changed = shutdown.changed() => {
                    match changed {
                        // A `false` write is not a stop request; keep waiting.
                        Ok(()) if !*shutdown.borrow() => {}
                        _ => {
                            info!("sync loop stopping");
                            return;
                        }
                    }
                }
            }
        }
    }
}
