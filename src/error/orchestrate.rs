use thiserror::Error;

use crate::script::ActionKind;

#[derive(Debug, Error, Clone, Copy)]
pub enum LimitKind {
    #[error("client workers")]
    ClientWorkers,
    #[error("clients per user")]
    ClientsPerUser,
    #[error("actions")]
    Actions,
}

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("Limit exceeded for {kind}: requested {requested}, ceiling {ceiling}.")]
    LimitExceeded {
        kind: LimitKind,
        requested: usize,
        ceiling: usize,
    },
    #[error("Action '{kind}' is not allowed for this exercise.")]
    ActionNotAllowed { kind: ActionKind },
    #[error("Client count must be >= 1.")]
    NoClients,
    #[error("Action timed out after {timeout_secs}s.")]
    ActionTimeout { timeout_secs: u64 },
    #[error("Connection error to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Target closed the connection.")]
    TargetClosed,
    #[error("Target rejected the action: {reply}")]
    TargetRejected { reply: String },
    #[error("Unexpected reply (expected '{expected}', got '{actual}').")]
    UnexpectedReply { expected: String, actual: String },
    #[error("Heartbeat lost for session '{session_id}'.")]
    HeartbeatLost { session_id: String },
    #[error("Execution cancelled.")]
    Cancelled,
    #[error("Execution exceeded its run budget.")]
    RunBudgetExceeded,
    #[error("Client runner panicked: {message}")]
    RunnerPanic { message: String },
}
