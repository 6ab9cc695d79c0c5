use std::io;
use std::sync::Arc;

use courier_core::{Effect, Msg, RequestId, Scope, ScopeProfile};
use courier_engine::{
    BackendCanceller, EngineCommand, EngineEvent, EngineHandle, EventBus, LoopbackBackend,
    LoopbackRoute, UnavailableCanceller,
};
use courier_logging::{courier_debug, courier_info};

use super::config::LoopbackConfig;

/// Scopes the loopback backend answers for.
const BUILT_IN_SCOPES: [&str; 3] = [Scope::CHAT, Scope::DOCUMENT_QA, Scope::PARSER];

/// Executes core effects on the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(loopback: &LoopbackConfig) -> io::Result<Self> {
        let bus = EventBus::new();
        let backend = loopback
            .enabled
            .then(|| Arc::new(LoopbackBackend::new(loopback.settings())));
        let canceller: Arc<dyn BackendCanceller> = match &backend {
            Some(backend) => backend.clone(),
            None => Arc::new(UnavailableCanceller),
        };

        let engine = EngineHandle::new(Arc::new(bus.clone()), canceller)?;
        if let Some(backend) = backend {
            backend
                .attach(&bus, engine.runtime_handle(), loopback_routes())
                .map_err(io::Error::other)?;
            courier_info!("Loopback backend attached");
        }
        Ok(Self { engine })
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            courier_debug!("Running {:?}", effect);
            self.engine.send(to_command(effect));
        }
    }

    /// Next engine event as a core message, stamped with `now_ms`.
    pub fn poll(&self, now_ms: u64) -> Option<Msg> {
        self.engine.try_recv().map(|event| to_msg(event, now_ms))
    }
}

fn loopback_routes() -> Vec<LoopbackRoute> {
    BUILT_IN_SCOPES
        .into_iter()
        .map(|name| {
            let profile = ScopeProfile::for_scope(&Scope::new(name));
            LoopbackRoute {
                scope: name.to_string(),
                request_event: profile.request_event,
                response_event: profile.response_event,
                progress_event: profile.progress_event,
                input_field: profile.input_field,
            }
        })
        .collect()
}

fn to_command(effect: Effect) -> EngineCommand {
    match effect {
        Effect::Subscribe { scope, event } => EngineCommand::Subscribe {
            scope: scope.to_string(),
            event,
        },
        Effect::Unsubscribe { scope, event } => EngineCommand::Unsubscribe {
            scope: scope.to_string(),
            event,
        },
        Effect::Emit {
            scope,
            request_id,
            event,
            payload,
        } => EngineCommand::Emit {
            scope: scope.to_string(),
            request_id: request_id.to_string(),
            event,
            payload,
        },
        Effect::CancelBackendJob { scope, request_id } => EngineCommand::CancelBackendJob {
            scope: scope.to_string(),
            request_id: request_id.to_string(),
        },
    }
}

fn to_msg(event: EngineEvent, at_ms: u64) -> Msg {
    match event {
        EngineEvent::Delivered { event, payload } => Msg::TransportEvent {
            event,
            payload,
            at_ms,
        },
        EngineEvent::EmitFailed {
            scope,
            request_id,
            error,
        } => Msg::EmitFailed {
            scope: Scope::new(scope),
            request_id: RequestId::new(request_id),
            error: error.to_string(),
            at_ms,
        },
        EngineEvent::SubscribeFailed {
            scope,
            event,
            error,
        } => Msg::SubscribeFailed {
            scope: Scope::new(scope),
            event,
            error: error.to_string(),
            at_ms,
        },
        EngineEvent::CancelSettled {
            scope,
            request_id,
            outcome,
        } => Msg::CancelSettled {
            scope: Scope::new(scope),
            request_id: RequestId::new(request_id),
            outcome: outcome.map_err(|err| err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use courier_core::{update, AppState, OperationStatus, Role, CANCELLED_NOTICE};
    use courier_engine::{CancelError, TransportError};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    use super::*;

    fn runner() -> EffectRunner {
        courier_logging::initialize_for_tests();
        EffectRunner::new(&LoopbackConfig {
            enabled: true,
            step_delay_ms: 20,
            failure_trigger: String::new(),
        })
        .unwrap()
    }

    fn dispatch(runner: &EffectRunner, state: AppState, msg: Msg) -> AppState {
        let (state, effects) = update(state, msg);
        runner.run(effects);
        state
    }

    fn submit(runner: &EffectRunner, state: AppState, input: &str) -> AppState {
        dispatch(
            runner,
            state,
            Msg::Submitted {
                scope: Scope::chat(),
                input: input.to_string(),
                params: Map::new(),
                at_ms: 0,
            },
        )
    }

    /// Feeds engine events into `update` until `done` holds or `timeout` passes.
    fn pump(
        runner: &EffectRunner,
        mut state: AppState,
        timeout: Duration,
        done: impl Fn(&AppState) -> bool,
    ) -> AppState {
        let deadline = Instant::now() + timeout;
        while !done(&state) && Instant::now() < deadline {
            match runner.poll(0) {
                Some(msg) => state = dispatch(runner, state, msg),
                None => thread::sleep(Duration::from_millis(5)),
            }
        }
        state
    }

    #[test]
    fn loopback_answer_completes_the_placeholder() {
        let runner = runner();
        let chat = Scope::chat();
        let state = dispatch(&runner, AppState::new(), Msg::ScopeOpened(chat.clone()));
        let state = submit(&runner, state, "hello");
        let id = state.registry().current_id(&chat).cloned().unwrap();

        let state = pump(&runner, state, Duration::from_secs(5), |s| !s.is_busy(&chat));

        assert_eq!(
            state.registry().finished_status(&id),
            Some(OperationStatus::Completed)
        );
        let answer = &state.timeline().messages(&chat)[1];
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "[chat] hello");
        assert!(!answer.is_loading);
        assert!(answer.processing_time_ms.is_some());
    }

    #[test]
    fn resubmit_after_cancel_gets_its_own_answer() {
        let runner = runner();
        let chat = Scope::chat();
        let state = submit(&runner, AppState::new(), "first");
        let first = state.registry().current_id(&chat).cloned().unwrap();
        let state = dispatch(
            &runner,
            state,
            Msg::CancelClicked {
                scope: chat.clone(),
                at_ms: 0,
            },
        );
        let state = submit(&runner, state, "second");
        let second = state.registry().current_id(&chat).cloned().unwrap();
        assert_ne!(first, second);

        let state = pump(&runner, state, Duration::from_secs(5), |s| !s.is_busy(&chat));
        // Give the first job's late response time to arrive and be dropped.
        let state = pump(&runner, state, Duration::from_millis(200), |_| false);

        assert_eq!(
            state.registry().finished_status(&second),
            Some(OperationStatus::Completed)
        );
        let contents: Vec<(Role, &str)> = state
            .timeline()
            .messages(&chat)
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            contents,
            vec![
                (Role::User, "first"),
                (Role::Error, CANCELLED_NOTICE),
                (Role::User, "second"),
                (Role::Assistant, "[chat] second"),
            ]
        );
        assert!(state.last_error(&chat).is_none());
    }

    #[test]
    fn routes_cover_built_in_scopes() {
        let routes = loopback_routes();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].request_event, "inference-completion-request");
        assert_eq!(routes[1].input_field, "documentPrompt");
        assert_eq!(routes[2].response_event, "add-document-response");
    }

    #[test]
    fn effects_map_to_engine_commands() {
        let command = to_command(Effect::Emit {
            scope: Scope::chat(),
            request_id: RequestId::new("chat_req_0_1"),
            event: "inference-completion-request".to_string(),
            payload: json!({"requestId": "chat_req_0_1"}),
        });
        assert_eq!(
            command,
            EngineCommand::Emit {
                scope: "chat".to_string(),
                request_id: "chat_req_0_1".to_string(),
                event: "inference-completion-request".to_string(),
                payload: json!({"requestId": "chat_req_0_1"}),
            }
        );
    }

    #[test]
    fn engine_events_map_to_messages() {
        let msg = to_msg(
            EngineEvent::EmitFailed {
                scope: "parser".to_string(),
                request_id: "parser_req_0_1".to_string(),
                error: TransportError::Closed,
            },
            42,
        );
        assert_eq!(
            msg,
            Msg::EmitFailed {
                scope: Scope::parser(),
                request_id: RequestId::new("parser_req_0_1"),
                error: "event bus is closed".to_string(),
                at_ms: 42,
            }
        );

        let msg = to_msg(
            EngineEvent::CancelSettled {
                scope: "chat".to_string(),
                request_id: "chat_req_0_1".to_string(),
                outcome: Err(CancelError::NothingRunning),
            },
            0,
        );
        assert_eq!(
            msg,
            Msg::CancelSettled {
                scope: Scope::chat(),
                request_id: RequestId::new("chat_req_0_1"),
                outcome: Err("no operation running".to_string()),
            }
        );
    }
}
