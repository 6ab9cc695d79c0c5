use std::collections::{BTreeMap, BTreeSet};

use crate::view_model::{AppViewModel, ScopeView};
use crate::{
    EngineError, MessageTimeline, OperationRegistry, ProgressRelay, RequestIdGenerator, Scope,
    ScopeProfile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    Response,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScopeSlot {
    pub(crate) profile: ScopeProfile,
    pub(crate) subscribed: bool,
    pub(crate) last_error: Option<EngineError>,
}

/// The single owned application state. Mutated only by [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub(crate) ids: RequestIdGenerator,
    pub(crate) registry: OperationRegistry,
    pub(crate) timeline: MessageTimeline,
    pub(crate) progress: ProgressRelay,
    slots: BTreeMap<Scope, ScopeSlot>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose request ids embed `epoch_ms`, normally the process start time.
    pub fn with_id_epoch(epoch_ms: u64) -> Self {
        Self {
            ids: RequestIdGenerator::new(epoch_ms),
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        let scopes: BTreeSet<&Scope> = self.slots.keys().chain(self.timeline.scopes()).collect();
        AppViewModel {
            scopes: scopes
                .into_iter()
                .map(|scope| ScopeView {
                    scope: scope.clone(),
                    busy: self.registry.is_busy(scope),
                    status: self.registry.current(scope).map(|op| op.status()),
                    progress: self.progress.current(scope).cloned(),
                    messages: self.timeline.messages(scope).to_vec(),
                    last_error: self.slots.get(scope).and_then(|slot| slot.last_error.clone()),
                })
                .collect(),
            dirty: self.dirty,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn timeline(&self) -> &MessageTimeline {
        &self.timeline
    }

    pub fn progress(&self) -> &ProgressRelay {
        &self.progress
    }

    pub fn is_busy(&self, scope: &Scope) -> bool {
        self.registry.is_busy(scope)
    }

    pub fn is_subscribed(&self, scope: &Scope) -> bool {
        self.slots.get(scope).is_some_and(|slot| slot.subscribed)
    }

    pub fn last_error(&self, scope: &Scope) -> Option<&EngineError> {
        self.slots.get(scope).and_then(|slot| slot.last_error.as_ref())
    }

    /// Returns whether anything visible changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn slot_mut(&mut self, scope: &Scope) -> &mut ScopeSlot {
        self.slots.entry(scope.clone()).or_insert_with(|| ScopeSlot {
            profile: ScopeProfile::for_scope(scope),
            subscribed: false,
            last_error: None,
        })
    }

    pub(crate) fn record_error(&mut self, scope: &Scope, error: EngineError) {
        self.slot_mut(scope).last_error = Some(error);
        self.mark_dirty();
    }

    /// Which open scope listens to `event`, and in what role.
    pub(crate) fn route(&self, event: &str) -> Option<(Scope, EventKind)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.subscribed)
            .find_map(|(scope, slot)| {
                if slot.profile.response_event == event {
                    Some((scope.clone(), EventKind::Response))
                } else if slot.profile.progress_event == event {
                    Some((scope.clone(), EventKind::Progress))
                } else {
                    None
                }
            })
    }
}
