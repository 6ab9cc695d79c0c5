//! User-initiated cancellation.
//!
//! Local state is released optimistically inside the dispatch that handles the
//! click; the backend is only asked to stop afterwards, through
//! [`Effect::CancelBackendJob`]. Whatever the backend still sends for the old
//! request id is then dropped by the stale-event guard.

use courier_logging::courier_info;

use crate::{AppState, Effect, MessageUpdate, Placement, Scope, TerminalStatus};

pub const CANCELLED_NOTICE: &str = "Generation cancelled by user";

/// Cancels the scope's in-flight operation. No-op (and no effect) when idle.
pub(crate) fn cancel_scope(state: &mut AppState, scope: &Scope, at_ms: u64) -> Option<Effect> {
    let request_id = state.registry.current_id(scope)?.clone();

    let placement = state.timeline.replace_placeholder(
        scope,
        &request_id,
        MessageUpdate::failed(CANCELLED_NOTICE),
        at_ms,
    );
    if !matches!(placement, Placement::Replaced(_)) {
        courier_info!(
            "Cancel of {} on {} found no tagged placeholder ({:?})",
            request_id,
            scope,
            placement
        );
    }

    state
        .registry
        .complete(scope, &request_id, TerminalStatus::Cancelled);
    state.progress.clear(scope);
    state.mark_dirty();
    courier_info!("Cancelled {} on {}", request_id, scope);

    Some(Effect::CancelBackendJob {
        scope: scope.clone(),
        request_id,
    })
}
