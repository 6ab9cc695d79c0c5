use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;

use crate::{MessageId, RequestId, Scope};

/// How many finished operations are remembered for classifying late events.
const RECENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Transitions only move forward; terminal states are absorbing.
    pub fn can_advance_to(self, next: OperationStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Streaming) => true,
            (Self::Pending | Self::Streaming, next) => next.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
    Cancelled,
}

impl From<TerminalStatus> for OperationStatus {
    fn from(value: TerminalStatus) -> Self {
        match value {
            TerminalStatus::Completed => OperationStatus::Completed,
            TerminalStatus::Failed => OperationStatus::Failed,
            TerminalStatus::Cancelled => OperationStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    id: RequestId,
    scope: Scope,
    status: OperationStatus,
    started_at_ms: u64,
    placeholder: Option<MessageId>,
}

impl Operation {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn placeholder(&self) -> Option<MessageId> {
        self.placeholder
    }

    fn advance(&mut self, next: OperationStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scope {scope} is busy with {active}")]
pub struct ScopeBusy {
    pub scope: Scope,
    pub active: RequestId,
}

/// Holds at most one non-terminal operation per scope.
///
/// Operations leave the active map the moment they reach a terminal status, so
/// "present in `active`" and "non-terminal" are the same thing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationRegistry {
    active: BTreeMap<Scope, Operation>,
    recent: VecDeque<Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new operation, or rejects it when the scope already has one in flight.
    pub fn start(
        &mut self,
        scope: &Scope,
        id: RequestId,
        started_at_ms: u64,
    ) -> Result<&Operation, ScopeBusy> {
        if let Some(active) = self.active.get(scope) {
            return Err(ScopeBusy {
                scope: scope.clone(),
                active: active.id.clone(),
            });
        }
        let operation = Operation {
            id,
            scope: scope.clone(),
            status: OperationStatus::Pending,
            started_at_ms,
            placeholder: None,
        };
        Ok(self.active.entry(scope.clone()).or_insert(operation))
    }

    pub fn bind_placeholder(&mut self, scope: &Scope, id: &RequestId, message: MessageId) -> bool {
        match self.active.get_mut(scope) {
            Some(op) if &op.id == id => {
                op.placeholder = Some(message);
                true
            }
            _ => false,
        }
    }

    /// PENDING -> STREAMING on first progress. Returns whether `id` is the active operation.
    pub fn mark_streaming(&mut self, scope: &Scope, id: &RequestId) -> bool {
        match self.active.get_mut(scope) {
            Some(op) if &op.id == id => {
                op.advance(OperationStatus::Streaming);
                true
            }
            _ => false,
        }
    }

    /// Finishes the scope's operation if `id` is still the current one; stale ids are ignored.
    pub fn complete(
        &mut self,
        scope: &Scope,
        id: &RequestId,
        status: TerminalStatus,
    ) -> Option<Operation> {
        if !self.matches(scope, id) {
            return None;
        }
        let mut operation = self.active.remove(scope)?;
        operation.advance(status.into());
        self.remember(operation.clone());
        Some(operation)
    }

    /// Drops whatever is in flight for `scope`, recording it as cancelled.
    pub fn release(&mut self, scope: &Scope) -> Option<Operation> {
        let id = self.active.get(scope)?.id.clone();
        self.complete(scope, &id, TerminalStatus::Cancelled)
    }

    pub fn is_busy(&self, scope: &Scope) -> bool {
        self.active.contains_key(scope)
    }

    pub fn current(&self, scope: &Scope) -> Option<&Operation> {
        self.active.get(scope)
    }

    pub fn current_id(&self, scope: &Scope) -> Option<&RequestId> {
        self.active.get(scope).map(|op| &op.id)
    }

    pub fn matches(&self, scope: &Scope, id: &RequestId) -> bool {
        self.current_id(scope) == Some(id)
    }

    /// Terminal status of a recently finished operation, if still remembered.
    pub fn finished_status(&self, id: &RequestId) -> Option<OperationStatus> {
        self.recent
            .iter()
            .rev()
            .find(|op| &op.id == id)
            .map(|op| op.status)
    }

    pub fn active(&self) -> impl Iterator<Item = &Operation> {
        self.active.values()
    }

    fn remember(&mut self, operation: Operation) {
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(operation);
    }
}
