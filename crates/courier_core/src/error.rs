use thiserror::Error;

/// User-visible failures, recorded per scope and shown next to the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Why an inbound event was discarded without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("request id does not match the scope's current operation")]
    StaleEvent,
    #[error("operation was already cancelled")]
    CancellationRace,
    #[error("event carries no request id")]
    MissingRequestId,
    #[error("no open scope listens to this event")]
    UnknownEvent,
    #[error("payload could not be interpreted")]
    Malformed,
    #[error("progress is lower than the last accepted value")]
    OutOfOrderProgress,
}
