use courier_logging::{courier_debug, courier_error, courier_info, courier_warn};
use serde_json::{Map, Value};

use crate::cancel::cancel_scope;
use crate::normalize::{extract_request_id, normalize_progress, normalize_response};
use crate::state::EventKind;
use crate::{
    AppState, CanonicalResult, DropReason, Effect, EngineError, HistoryEntry, MessageMeta,
    MessageUpdate, Msg, OperationStatus, RequestId, Role, Scope, TerminalStatus,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ScopeOpened(scope) => ensure_subscribed(&mut state, &scope),
        Msg::ScopeClosed { scope, at_ms } => close_scope(&mut state, &scope, at_ms),
        Msg::Submitted {
            scope,
            input,
            params,
            at_ms,
        } => submit(&mut state, scope, &input, params, at_ms),
        Msg::CancelClicked { scope, at_ms } => {
            cancel_scope(&mut state, &scope, at_ms).into_iter().collect()
        }
        Msg::ClearClicked(scope) => {
            clear_scope(&mut state, &scope);
            Vec::new()
        }
        Msg::HistoryRestored { scope, entries } => {
            restore_history(&mut state, &scope, entries);
            Vec::new()
        }
        Msg::TransportEvent {
            event,
            payload,
            at_ms,
        } => {
            if let Err(reason) = route_event(&mut state, &event, &payload, at_ms) {
                courier_debug!("Dropped {} event: {}", event, reason);
            }
            Vec::new()
        }
        Msg::EmitFailed {
            scope,
            request_id,
            error,
            at_ms,
        } => {
            courier_error!("Emit for {} on {} failed: {}", request_id, scope, error);
            fail_with_transport_error(&mut state, &scope, &request_id, &error, at_ms);
            Vec::new()
        }
        Msg::SubscribeFailed {
            scope,
            event,
            error,
            at_ms,
        } => {
            courier_error!("Subscribe to {} for {} failed: {}", event, scope, error);
            state.slot_mut(&scope).subscribed = false;
            let current = state.registry.current_id(&scope).cloned();
            match current {
                Some(request_id) => {
                    fail_with_transport_error(&mut state, &scope, &request_id, &error, at_ms)
                }
                None => state.record_error(&scope, EngineError::Transport(error)),
            }
            Vec::new()
        }
        Msg::CancelSettled {
            scope,
            request_id,
            outcome,
        } => {
            match outcome {
                Ok(ack) => courier_info!("Backend acknowledged cancel of {} on {}: {}", request_id, scope, ack),
                Err(err) => courier_warn!("Backend cancel of {} on {} failed: {}", request_id, scope, err),
            }
            Vec::new()
        }
    };

    (state, effects)
}

fn ensure_subscribed(state: &mut AppState, scope: &Scope) -> Vec<Effect> {
    let slot = state.slot_mut(scope);
    if slot.subscribed {
        return Vec::new();
    }
    slot.subscribed = true;
    courier_debug!("Subscribing {} events", scope);
    vec![
        Effect::Subscribe {
            scope: scope.clone(),
            event: slot.profile.response_event.clone(),
        },
        Effect::Subscribe {
            scope: scope.clone(),
            event: slot.profile.progress_event.clone(),
        },
    ]
}

fn close_scope(state: &mut AppState, scope: &Scope, at_ms: u64) -> Vec<Effect> {
    // Nobody will observe the response once we unsubscribe, so release first.
    let mut effects: Vec<Effect> = cancel_scope(state, scope, at_ms).into_iter().collect();
    let slot = state.slot_mut(scope);
    if slot.subscribed {
        slot.subscribed = false;
        effects.push(Effect::Unsubscribe {
            scope: scope.clone(),
            event: slot.profile.response_event.clone(),
        });
        effects.push(Effect::Unsubscribe {
            scope: scope.clone(),
            event: slot.profile.progress_event.clone(),
        });
    }
    effects
}

fn submit(
    state: &mut AppState,
    scope: Scope,
    input: &str,
    params: Map<String, Value>,
    at_ms: u64,
) -> Vec<Effect> {
    let input = input.trim();
    if input.is_empty() {
        courier_warn!("Rejected submit on {}: input is empty", scope);
        state.record_error(&scope, EngineError::Validation("input is empty".to_string()));
        return Vec::new();
    }

    let request_id = state.ids.mint(&scope);
    if let Err(busy) = state.registry.start(&scope, request_id.clone(), at_ms) {
        courier_info!("Ignoring submit: {}", busy);
        return Vec::new();
    }

    let mut effects = ensure_subscribed(state, &scope);
    let slot = state.slot_mut(&scope);
    slot.last_error = None;
    let profile = slot.profile.clone();

    state
        .timeline
        .append(&scope, Role::User, input, MessageMeta::at(at_ms));
    let placeholder = state.timeline.append(
        &scope,
        Role::Assistant,
        profile.placeholder.as_str(),
        MessageMeta::placeholder(request_id.clone(), at_ms),
    );
    state
        .registry
        .bind_placeholder(&scope, &request_id, placeholder);
    state.mark_dirty();
    courier_info!(
        "Submitted {} on {} (input_len={})",
        request_id,
        scope,
        input.len()
    );

    let payload = request_payload(&scope, &request_id, &profile.input_field, input, params);
    effects.push(Effect::Emit {
        scope,
        request_id,
        event: profile.request_event,
        payload,
    });
    effects
}

fn request_payload(
    scope: &Scope,
    request_id: &RequestId,
    input_field: &str,
    input: &str,
    mut params: Map<String, Value>,
) -> Value {
    params.insert(input_field.to_string(), Value::from(input));
    params.insert("requestId".to_string(), Value::from(request_id.as_str()));
    params.insert("scope".to_string(), Value::from(scope.as_str()));
    Value::Object(params)
}

fn route_event(
    state: &mut AppState,
    event: &str,
    payload: &Value,
    at_ms: u64,
) -> Result<(), DropReason> {
    let (scope, kind) = state.route(event).ok_or(DropReason::UnknownEvent)?;
    match kind {
        EventKind::Progress => on_progress(state, &scope, payload),
        EventKind::Response => on_response(state, &scope, payload, at_ms),
    }
}

fn on_progress(state: &mut AppState, scope: &Scope, payload: &Value) -> Result<(), DropReason> {
    let event = normalize_progress(payload)?;
    if !state.registry.matches(scope, &event.request_id) {
        return Err(classify_stray(state, &event.request_id));
    }
    let request_id = event.request_id.clone();
    let current = state.registry.current_id(scope).cloned();
    state.progress.on_progress(scope, current.as_ref(), event)?;
    state.registry.mark_streaming(scope, &request_id);
    state.mark_dirty();
    Ok(())
}

fn on_response(
    state: &mut AppState,
    scope: &Scope,
    payload: &Value,
    at_ms: u64,
) -> Result<(), DropReason> {
    let request_id = match extract_request_id(payload) {
        Some(id) => id,
        None => {
            let current = state
                .registry
                .current_id(scope)
                .cloned()
                .ok_or(DropReason::MissingRequestId)?;
            courier_warn!(
                "Response on {} has no request id; attributing it to {}",
                scope,
                current
            );
            current
        }
    };
    if !state.registry.matches(scope, &request_id) {
        return Err(classify_stray(state, &request_id));
    }
    let canonical = normalize_response(payload);
    finish(state, scope, &request_id, canonical, at_ms);
    Ok(())
}

fn finish(
    state: &mut AppState,
    scope: &Scope,
    request_id: &RequestId,
    canonical: CanonicalResult,
    at_ms: u64,
) {
    let (status, update) = if canonical.success {
        (
            TerminalStatus::Completed,
            MessageUpdate::finished(canonical.result.as_str())
                .with_processing_time(canonical.processing_time_ms),
        )
    } else {
        let reason = canonical.failure_text().to_string();
        state.record_error(scope, EngineError::Backend(reason.clone()));
        (
            TerminalStatus::Failed,
            MessageUpdate::failed(format!("Error: {reason}")),
        )
    };

    let placement = state
        .timeline
        .replace_placeholder(scope, request_id, update, at_ms);
    state.registry.complete(scope, request_id, status);
    state.progress.clear(scope);
    state.mark_dirty();
    courier_info!(
        "{} on {} finished {:?} ({:?}, processing_time_ms={:?})",
        request_id,
        scope,
        status,
        placement,
        canonical.processing_time_ms
    );
}

fn fail_with_transport_error(
    state: &mut AppState,
    scope: &Scope,
    request_id: &RequestId,
    error: &str,
    at_ms: u64,
) {
    if !state.registry.matches(scope, request_id) {
        courier_debug!("Transport failure for {} no longer relevant", request_id);
        return;
    }
    state.timeline.replace_placeholder(
        scope,
        request_id,
        MessageUpdate::failed(format!("Error: failed to reach backend: {error}")),
        at_ms,
    );
    state
        .registry
        .complete(scope, request_id, TerminalStatus::Failed);
    state.progress.clear(scope);
    state.record_error(scope, EngineError::Transport(error.to_string()));
}

fn clear_scope(state: &mut AppState, scope: &Scope) {
    let removed = state.timeline.clear(scope);
    if let Some(released) = state.registry.release(scope) {
        courier_info!("Clearing {} released {}", scope, released.id());
    }
    state.progress.clear(scope);
    state.slot_mut(scope).last_error = None;
    state.mark_dirty();
    courier_info!("Cleared {} ({} messages)", scope, removed);
}

fn restore_history(state: &mut AppState, scope: &Scope, entries: Vec<HistoryEntry>) {
    if state.registry.is_busy(scope) {
        courier_warn!("Ignoring history restore on {}: operation in flight", scope);
        return;
    }
    state.timeline.clear(scope);
    for entry in entries {
        let question = entry.question.trim();
        if !question.is_empty() {
            state
                .timeline
                .append(scope, Role::User, question, MessageMeta::at(entry.at_ms));
        }
        if !entry.response.trim().is_empty() {
            state.timeline.append(
                scope,
                Role::Assistant,
                entry.response,
                MessageMeta::at(entry.at_ms),
            );
        }
    }
    state.mark_dirty();
}

fn classify_stray(state: &AppState, request_id: &RequestId) -> DropReason {
    match state.registry.finished_status(request_id) {
        Some(OperationStatus::Cancelled) => DropReason::CancellationRace,
        _ => DropReason::StaleEvent,
    }
}
