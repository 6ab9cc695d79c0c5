use serde_json::Value;
use thiserror::Error;

pub type SubscriptionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("event bus is closed")]
    Closed,
    #[error("listener limit of {limit} reached for {event}")]
    ListenerLimit { event: String, limit: usize },
    #[error("event bus lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelError {
    #[error("no operation running")]
    NothingRunning,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// What the engine reports back to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A subscribed event arrived on the transport.
    Delivered { event: String, payload: Value },
    EmitFailed {
        scope: String,
        request_id: String,
        error: TransportError,
    },
    SubscribeFailed {
        scope: String,
        event: String,
        error: TransportError,
    },
    CancelSettled {
        scope: String,
        request_id: String,
        outcome: Result<String, CancelError>,
    },
}
