use serde_json::Value;

use crate::{RequestId, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Subscribe { scope: Scope, event: String },
    Unsubscribe { scope: Scope, event: String },
    Emit {
        scope: Scope,
        request_id: RequestId,
        event: String,
        payload: Value,
    },
    /// Ask the backend to stop. Local state has already been released.
    CancelBackendJob { scope: Scope, request_id: RequestId },
}
