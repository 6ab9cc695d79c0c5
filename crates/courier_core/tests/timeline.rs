use courier_core::{MessageMeta, MessageTimeline, MessageUpdate, Placement, RequestId, Role, Scope};

#[test]
fn replace_targets_the_tagged_placeholder() {
    let chat = Scope::chat();
    let mut timeline = MessageTimeline::new();
    timeline.append(&chat, Role::User, "Q1", MessageMeta::at(1));
    let first = timeline.append(
        &chat,
        Role::Assistant,
        "AI is thinking...",
        MessageMeta::placeholder(RequestId::from("a"), 1),
    );
    let second = timeline.append(
        &chat,
        Role::Assistant,
        "AI is thinking...",
        MessageMeta::placeholder(RequestId::from("b"), 2),
    );

    let placement = timeline.replace_placeholder(
        &chat,
        &RequestId::from("b"),
        MessageUpdate::finished("answer b"),
        9,
    );
    assert_eq!(placement, Placement::Replaced(second));

    let b = timeline.get(&chat, second).unwrap();
    assert_eq!(b.content, "answer b");
    assert!(!b.is_loading);
    assert_eq!(b.timestamp_ms, 2);
    assert!(timeline.get(&chat, first).unwrap().is_loading);
}

#[test]
fn explicit_timestamp_overrides_placeholder_time() {
    let chat = Scope::chat();
    let mut timeline = MessageTimeline::new();
    let id = timeline.append(
        &chat,
        Role::Assistant,
        "...",
        MessageMeta::placeholder(RequestId::from("a"), 100),
    );
    let update = MessageUpdate {
        timestamp_ms: Some(500),
        ..MessageUpdate::finished("done")
    };
    timeline.replace_placeholder(&chat, &RequestId::from("a"), update, 900);
    assert_eq!(timeline.get(&chat, id).unwrap().timestamp_ms, 500);
}

#[test]
fn untagged_loading_message_is_used_as_fallback() {
    let chat = Scope::chat();
    let mut timeline = MessageTimeline::new();
    let id = timeline.append(
        &chat,
        Role::Assistant,
        "...",
        MessageMeta {
            is_loading: true,
            ..MessageMeta::at(3)
        },
    );

    let placement = timeline.replace_placeholder(
        &chat,
        &RequestId::from("lost"),
        MessageUpdate::failed("Error: boom"),
        4,
    );
    assert_eq!(placement, Placement::Fallback(id));
    let message = timeline.get(&chat, id).unwrap();
    assert_eq!(message.role, Role::Error);
    assert_eq!(message.request_id, Some(RequestId::from("lost")));
}

#[test]
fn fallback_never_crosses_scopes() {
    let mut timeline = MessageTimeline::new();
    timeline.append(
        &Scope::document_qa(),
        Role::Assistant,
        "...",
        MessageMeta::placeholder(RequestId::from("doc"), 1),
    );

    let placement = timeline.replace_placeholder(
        &Scope::chat(),
        &RequestId::from("chat"),
        MessageUpdate::finished("hello"),
        2,
    );
    assert!(matches!(placement, Placement::Appended(_)));
    assert_eq!(timeline.loading(&Scope::document_qa()).count(), 1);
}

#[test]
fn missing_placeholder_appends_a_terminal_message() {
    let chat = Scope::chat();
    let mut timeline = MessageTimeline::new();
    let placement = timeline.replace_placeholder(
        &chat,
        &RequestId::from("a"),
        MessageUpdate::finished("late but kept").with_processing_time(Some(70)),
        42,
    );

    let Placement::Appended(id) = placement else {
        panic!("expected append, got {placement:?}");
    };
    let message = timeline.get(&chat, id).unwrap();
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.content, "late but kept");
    assert_eq!(message.timestamp_ms, 42);
    assert_eq!(message.processing_time_ms, Some(70));
    assert!(!message.is_loading);
}

#[test]
fn clear_only_touches_one_scope() {
    let mut timeline = MessageTimeline::new();
    timeline.append(&Scope::chat(), Role::User, "a", MessageMeta::at(1));
    timeline.append(&Scope::chat(), Role::User, "b", MessageMeta::at(2));
    timeline.append(&Scope::parser(), Role::User, "c", MessageMeta::at(3));

    assert_eq!(timeline.clear(&Scope::chat()), 2);
    assert!(timeline.messages(&Scope::chat()).is_empty());
    assert_eq!(timeline.messages(&Scope::parser()).len(), 1);
    assert_eq!(timeline.clear(&Scope::chat()), 0);
}

#[test]
fn message_ids_keep_increasing_across_clears() {
    let chat = Scope::chat();
    let mut timeline = MessageTimeline::new();
    let first = timeline.append(&chat, Role::User, "a", MessageMeta::at(1));
    timeline.clear(&chat);
    let second = timeline.append(&chat, Role::User, "b", MessageMeta::at(2));
    assert!(second > first);
}
