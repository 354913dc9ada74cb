use std::collections::HashMap;
use std::sync::Arc;

use arcshift::ArcShift;

use crate::error::BridgeError;
use crate::heartbeat::HeartbeatMonitor;
use crate::pki::PkiConnection;

/// Per-execution handles exposed to bridge sessions.
#[derive(Clone)]
pub struct SessionHandle {
    pub execution_id: String,
    pub pki: Arc<dyn PkiConnection>,
    pub heartbeat: HeartbeatMonitor,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("execution_id", &self.execution_id)
            .finish_non_exhaustive()
    }
}

/// Token → execution mapping shared between the orchestrator and the
/// bridge listeners. Deregistration on execution teardown is what turns a
/// token stale; stale tokens resolve to `SessionNotFound`.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: ArcShift<HashMap<String, SessionHandle>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: ArcShift::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, token: &str, handle: SessionHandle) {
        let token = token.to_owned();
        self.sessions.rcu(|current| {
            let mut next = current.clone();
            next.insert(token.clone(), handle.clone());
            next
        });
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::SessionNotFound`] for unknown or terminated
    /// sessions.
    pub fn resolve(&mut self, token: &str) -> Result<SessionHandle, BridgeError> {
        self.sessions
            .get()
            .get(token)
            .cloned()
            .ok_or_else(|| BridgeError::SessionNotFound {
                server_id: token.to_owned(),
            })
    }

    pub fn deregister(&mut self, token: &str) {
        let token = token.to_owned();
        self.sessions.rcu(|current| {
            let mut next = current.clone();
            next.remove(&token);
            next
        });
    }
}
