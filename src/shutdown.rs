use tokio::sync::broadcast;

/// Why an in-flight execution was told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    HeartbeatLost,
    RunBudgetExceeded,
    Cancelled,
}

impl AbortReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AbortReason::HeartbeatLost => "heartbeat lost",
            AbortReason::RunBudgetExceeded => "run budget exceeded",
            AbortReason::Cancelled => "cancelled",
        }
    }
}

pub type AbortSender = broadcast::Sender<AbortReason>;
pub type AbortReceiver = broadcast::Receiver<AbortReason>;

pub fn abort_channel() -> (AbortSender, AbortReceiver) {
    broadcast::channel(8)
}
