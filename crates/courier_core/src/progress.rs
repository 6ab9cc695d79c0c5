use std::collections::BTreeMap;

use crate::{DropReason, RequestId, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub request_id: RequestId,
    /// Percentage, 0..=100.
    pub progress: u8,
    pub message: String,
    pub status: String,
}

/// Latest progress per scope. No history: only the current snapshot matters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressRelay {
    latest: BTreeMap<Scope, ProgressEvent>,
}

impl ProgressRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `event` only if it belongs to `current`, the scope's in-flight
    /// operation as seen at the moment of delivery.
    pub fn on_progress(
        &mut self,
        scope: &Scope,
        current: Option<&RequestId>,
        event: ProgressEvent,
    ) -> Result<(), DropReason> {
        if current != Some(&event.request_id) {
            return Err(DropReason::StaleEvent);
        }
        if let Some(previous) = self.latest.get(scope) {
            if previous.request_id == event.request_id && previous.progress > event.progress {
                return Err(DropReason::OutOfOrderProgress);
            }
        }
        self.latest.insert(scope.clone(), event);
        Ok(())
    }

    pub fn current(&self, scope: &Scope) -> Option<&ProgressEvent> {
        self.latest.get(scope)
    }

    pub fn clear(&mut self, scope: &Scope) {
        self.latest.remove(scope);
    }
}
