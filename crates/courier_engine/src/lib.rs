//! Courier engine: transport plumbing and effect execution.
mod bus;
mod cancel;
mod engine;
mod loopback;
mod types;

pub use bus::{EventBus, Handler, Transport, DEFAULT_MAX_LISTENERS};
pub use cancel::{BackendCanceller, UnavailableCanceller};
pub use engine::{EngineCommand, EngineHandle};
pub use loopback::{LoopbackBackend, LoopbackRoute, LoopbackSettings, CANCELLED_BY_USER};
pub use types::{CancelError, EngineEvent, SubscriptionId, TransportError};
