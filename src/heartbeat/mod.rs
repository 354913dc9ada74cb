//! Session liveness tracking.
//!
//! Every bridge-routed request counts as a heartbeat. A per-execution
//! watchdog task polls the last-seen map and fires the execution's abort
//! channel on the first failed check.
use std::collections::HashMap;
use std::time::Duration;

use arcshift::ArcShift;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::shutdown::{AbortReason, AbortSender};

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct HeartbeatMonitor {
    last_seen: ArcShift<HashMap<String, Instant>>,
    timeout: Duration,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: ArcShift::new(HashMap::new()),
            timeout,
        }
    }

    /// Records `now()` as the session's last-seen timestamp.
    pub fn touch(&mut self, session_id: &str) {
        let session_id = session_id.to_owned();
        self.last_seen.rcu(|current| {
            let mut next = current.clone();
            next.insert(session_id.clone(), Instant::now());
            next
        });
    }

    /// A session is alive iff it has been seen within the timeout window.
    /// Sessions that were never touched are not alive.
    pub fn is_alive(&mut self, session_id: &str) -> bool {
        self.last_seen
            .get()
            .get(session_id)
            .is_some_and(|seen| seen.elapsed() < self.timeout)
    }

    /// Whether the session has ever been touched.
    pub fn seen(&mut self, session_id: &str) -> bool {
        self.last_seen.get().contains_key(session_id)
    }

    pub fn forget(&mut self, session_id: &str) {
        let session_id = session_id.to_owned();
        self.last_seen.rcu(|current| {
            let mut next = current.clone();
            next.remove(&session_id);
            next
        });
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Check interval for the watchdog: half the timeout, so a loss is noticed
/// within one polling interval after it elapses.
#[must_use]
pub fn heartbeat_check_interval(timeout: Duration) -> Duration {
    let timeout_ms = timeout.as_millis();
    let mut interval_ms = timeout_ms.saturating_div(2);
    if interval_ms < 50 {
        interval_ms = timeout_ms.max(1);
    }
    Duration::from_millis(u64::try_from(interval_ms).unwrap_or(1))
}

/// Spawns the per-execution liveness watchdog.
///
/// The watchdog arms once the session has been touched (immediately when
/// `arm_immediately` is set, which also seeds the first timestamp so the
/// session gets a full timeout window to produce its first beat). On the
/// first failed check it signals `AbortReason::HeartbeatLost` and exits.
/// Abort the returned handle when the execution ends.
pub fn spawn_watchdog(
    mut monitor: HeartbeatMonitor,
    session_id: String,
    abort_tx: AbortSender,
    arm_immediately: bool,
) -> JoinHandle<()> {
    if arm_immediately {
        monitor.touch(&session_id);
    }
    let check_interval = heartbeat_check_interval(monitor.timeout());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut armed = arm_immediately;
        loop {
            interval.tick().await;
            if !armed {
                if !monitor.seen(&session_id) {
                    continue;
                }
                debug!("Heartbeat watchdog armed for session {}", session_id);
                armed = true;
            }
            if !monitor.is_alive(&session_id) {
                warn!("Heartbeat lost for session {}", session_id);
                if abort_tx.send(AbortReason::HeartbeatLost).is_err() {
                    // Execution already finished; nothing to abort.
                }
                break;
            }
        }
    })
}
