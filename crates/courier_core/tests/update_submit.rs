use std::sync::Once;

use courier_core::{
    update, AppState, Effect, EngineError, Msg, OperationStatus, RequestId, Role, Scope,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

const CHAT_RESPONSE: &str = "inference-completion-response";
const CHAT_PROGRESS: &str = "inference-completion-progress";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(courier_logging::initialize_for_tests);
}

fn submit(state: AppState, scope: &Scope, input: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::Submitted {
            scope: scope.clone(),
            input: input.to_string(),
            params: Map::new(),
            at_ms: 1_000,
        },
    )
}

fn deliver(state: AppState, event: &str, payload: Value) -> AppState {
    let (state, effects) = update(
        state,
        Msg::TransportEvent {
            event: event.to_string(),
            payload,
            at_ms: 2_000,
        },
    );
    assert!(effects.is_empty());
    state
}

fn emitted_request_id(effects: &[Effect]) -> RequestId {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Emit { request_id, .. } => Some(request_id.clone()),
            _ => None,
        })
        .expect("emit effect")
}

#[test]
fn submit_appends_user_message_and_placeholder() {
    init_logging();
    let chat = Scope::chat();
    let (mut state, effects) = submit(AppState::new(), &chat, "  Hello \n");

    assert_eq!(
        effects,
        vec![
            Effect::Subscribe {
                scope: chat.clone(),
                event: CHAT_RESPONSE.to_string(),
            },
            Effect::Subscribe {
                scope: chat.clone(),
                event: CHAT_PROGRESS.to_string(),
            },
            Effect::Emit {
                scope: chat.clone(),
                request_id: RequestId::from("chat_req_0_1"),
                event: "inference-completion-request".to_string(),
                payload: json!({
                    "requestId": "chat_req_0_1",
                    "scope": "chat",
                    "promptText": "Hello",
                }),
            },
        ]
    );

    let messages = state.timeline().messages(&chat);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "AI is thinking...");
    assert!(messages[1].is_loading);
    assert_eq!(messages[1].request_id, Some(RequestId::from("chat_req_0_1")));

    let operation = state.registry().current(&chat).expect("operation");
    assert_eq!(operation.status(), OperationStatus::Pending);
    assert_eq!(operation.placeholder(), Some(messages[1].id));
    assert_eq!(operation.started_at_ms(), 1_000);
    assert!(state.is_busy(&chat));
    assert!(state.consume_dirty());
}

#[test]
fn job_parameters_are_forwarded_but_cannot_override_correlation_fields() {
    init_logging();
    let mut params = Map::new();
    params.insert("promptType".to_string(), json!("legal"));
    params.insert("requestId".to_string(), json!("forged"));
    let (_state, effects) = update(
        AppState::with_id_epoch(77),
        Msg::Submitted {
            scope: Scope::document_qa(),
            input: "Who signed?".to_string(),
            params,
            at_ms: 5,
        },
    );

    let Some(Effect::Emit { event, payload, .. }) = effects.last() else {
        panic!("expected emit last, got {effects:?}");
    };
    assert_eq!(event, "query-document-request");
    assert_eq!(
        payload,
        &json!({
            "promptType": "legal",
            "documentPrompt": "Who signed?",
            "requestId": "documentQA_req_77_1",
            "scope": "documentQA",
        })
    );
}

#[test]
fn progress_then_success_replaces_placeholder() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "Hello");
    let id = emitted_request_id(&effects);

    let state = deliver(
        state,
        CHAT_PROGRESS,
        json!({"requestId": id.as_str(), "progress": 40, "status": "generating", "message": "Generating completion..."}),
    );
    let progress = state.progress().current(&chat).expect("progress");
    assert_eq!(progress.progress, 40);
    assert_eq!(progress.message, "Generating completion...");
    assert_eq!(
        state.registry().current(&chat).map(|op| op.status()),
        Some(OperationStatus::Streaming)
    );
    // Progress never touches the timeline.
    assert!(state.timeline().messages(&chat)[1].is_loading);

    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"requestId": id.as_str(), "success": true, "result": "Hi there"}),
    );
    let messages = state.timeline().messages(&chat);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hi there");
    assert!(!messages[1].is_loading);
    assert_eq!(messages[1].timestamp_ms, 1_000);
    assert!(!state.is_busy(&chat));
    assert!(state.progress().current(&chat).is_none());
    assert_eq!(
        state.registry().finished_status(&id),
        Some(OperationStatus::Completed)
    );
}

#[test]
fn pascal_case_response_round_trips_with_processing_time() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "X");
    let id = emitted_request_id(&effects);

    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"RequestID": id.as_str(), "Success": true, "Result": "Y", "ProcessingTime": 1234}),
    );
    let finished: Vec<_> = state
        .timeline()
        .messages(&chat)
        .iter()
        .filter(|m| m.content == "Y")
        .collect();
    assert_eq!(finished.len(), 1);
    assert!(!finished[0].is_loading);
    assert_eq!(finished[0].processing_time_ms, Some(1234));
    assert_eq!(state.timeline().loading(&chat).count(), 0);
}

#[test]
fn backend_failure_renders_error_message() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "X");
    let id = emitted_request_id(&effects);

    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"requestId": id.as_str(), "success": false, "error": "model not loaded"}),
    );
    let placeholder = &state.timeline().messages(&chat)[1];
    assert_eq!(placeholder.role, Role::Error);
    assert_eq!(placeholder.content, "Error: model not loaded");
    assert!(!placeholder.is_loading);
    assert_eq!(
        state.last_error(&chat),
        Some(&EngineError::Backend("model not loaded".to_string()))
    );
    assert_eq!(
        state.registry().finished_status(&id),
        Some(OperationStatus::Failed)
    );
    assert!(!state.is_busy(&chat));
}

#[test]
fn empty_success_is_shown_as_failure() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "X");
    let id = emitted_request_id(&effects);

    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"requestId": id.as_str(), "success": true, "result": ""}),
    );
    let placeholder = &state.timeline().messages(&chat)[1];
    assert_eq!(placeholder.role, Role::Error);
    assert_eq!(placeholder.content, "Error: No content generated");
}

#[test]
fn response_without_request_id_is_attributed_to_inflight_operation() {
    init_logging();
    let chat = Scope::chat();
    let (state, _effects) = submit(AppState::new(), &chat, "X");

    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"RequestID": "", "Success": false, "Error": "invalid request data format"}),
    );
    assert!(!state.is_busy(&chat));
    assert_eq!(
        state.timeline().messages(&chat)[1].content,
        "Error: invalid request data format"
    );

    // With nothing in flight the same payload has nowhere to go.
    let before = state.clone();
    let state = deliver(state, CHAT_RESPONSE, json!({"Success": true, "Result": "orphan"}));
    assert_eq!(state.timeline(), before.timeline());
}

#[test]
fn blank_input_is_a_validation_error() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "   \n ");

    assert!(effects.is_empty());
    assert!(!state.is_busy(&chat));
    assert!(state.timeline().messages(&chat).is_empty());
    assert!(matches!(
        state.last_error(&chat),
        Some(EngineError::Validation(_))
    ));

    // A good submit clears the error.
    let (state, _effects) = submit(state, &chat, "ok");
    assert_eq!(state.last_error(&chat), None);
}

#[test]
fn submit_while_busy_is_ignored() {
    init_logging();
    let chat = Scope::chat();
    let (state, first) = submit(AppState::new(), &chat, "one");
    let (mut state, second) = submit(state, &chat, "two");

    assert!(second.is_empty());
    assert_eq!(state.timeline().messages(&chat).len(), 2);
    assert_eq!(
        state.registry().current_id(&chat),
        Some(&emitted_request_id(&first))
    );
    assert!(state.consume_dirty());
}

#[test]
fn subscriptions_are_made_once_per_scope_lifetime() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = update(AppState::new(), Msg::ScopeOpened(chat.clone()));
    assert_eq!(effects.len(), 2);
    assert!(state.is_subscribed(&chat));

    let (state, effects) = update(state, Msg::ScopeOpened(chat.clone()));
    assert!(effects.is_empty());

    let (state, effects) = submit(state, &chat, "Hello");
    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::Emit { .. }));

    let id = emitted_request_id(&effects);
    let state = deliver(
        state,
        CHAT_RESPONSE,
        json!({"requestId": id.as_str(), "success": true, "result": "hi"}),
    );
    let (_state, effects) = submit(state, &chat, "again");
    assert_eq!(effects.len(), 1);
    assert_eq!(emitted_request_id(&effects).as_str(), "chat_req_0_2");
}

#[test]
fn progress_going_backwards_is_ignored() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "Hello");
    let id = emitted_request_id(&effects);

    let state = deliver(state, CHAT_PROGRESS, json!({"requestId": id.as_str(), "progress": 50}));
    let state = deliver(state, CHAT_PROGRESS, json!({"requestId": id.as_str(), "progress": 20}));
    assert_eq!(state.progress().current(&chat).map(|p| p.progress), Some(50));

    let state = deliver(state, CHAT_PROGRESS, json!({"requestId": id.as_str(), "progress": 80}));
    assert_eq!(state.progress().current(&chat).map(|p| p.progress), Some(80));
}

#[test]
fn events_for_unopened_scopes_are_dropped() {
    init_logging();
    let mut state = AppState::new();
    let before = state.clone();
    let state_after = deliver(
        state.clone(),
        "query-document-response",
        json!({"requestId": "documentQA_req_0_1", "success": true, "result": "x"}),
    );
    assert_eq!(state_after, before);
    assert!(!state.consume_dirty());
}

#[test]
fn view_reflects_scope_state() {
    init_logging();
    let chat = Scope::chat();
    let (state, effects) = submit(AppState::new(), &chat, "Hello");
    let id = emitted_request_id(&effects);
    let state = deliver(state, CHAT_PROGRESS, json!({"requestId": id.as_str(), "progress": 10}));

    let view = state.view();
    let chat_view = view.scope(&chat).expect("chat view");
    assert!(chat_view.busy);
    assert_eq!(chat_view.status, Some(OperationStatus::Streaming));
    assert_eq!(chat_view.progress.as_ref().map(|p| p.progress), Some(10));
    assert_eq!(chat_view.messages.len(), 2);
    assert!(view.dirty);
    assert!(view.scope(&Scope::parser()).is_none());
}
