use serde_json::{Map, Value};

use crate::{RequestId, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Front end opened a scope; its response/progress events get subscribed once.
    ScopeOpened(Scope),
    /// Front end tore a scope down; unsubscribe and release anything in flight.
    ScopeClosed { scope: Scope, at_ms: u64 },
    /// User submitted input for a scope.
    Submitted {
        scope: Scope,
        input: String,
        /// Extra job parameters forwarded verbatim in the request payload.
        params: Map<String, Value>,
        at_ms: u64,
    },
    /// User clicked Cancel.
    CancelClicked { scope: Scope, at_ms: u64 },
    /// User cleared the scope's conversation.
    ClearClicked(Scope),
    /// Saved conversation history loaded into a scope.
    HistoryRestored {
        scope: Scope,
        entries: Vec<HistoryEntry>,
    },
    /// An event arrived on a subscribed transport channel.
    TransportEvent {
        event: String,
        payload: Value,
        at_ms: u64,
    },
    /// The request emit for an operation failed.
    EmitFailed {
        scope: Scope,
        request_id: RequestId,
        error: String,
        at_ms: u64,
    },
    /// Subscribing one of the scope's events failed.
    SubscribeFailed {
        scope: Scope,
        event: String,
        error: String,
        at_ms: u64,
    },
    /// Best-effort backend cancel finished; informational only.
    CancelSettled {
        scope: Scope,
        request_id: RequestId,
        outcome: Result<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub question: String,
    pub response: String,
    pub at_ms: u64,
}
