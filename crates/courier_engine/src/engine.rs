use std::collections::HashMap;
use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use courier_logging::{courier_debug, courier_warn};
use serde_json::Value;

use crate::{BackendCanceller, EngineEvent, SubscriptionId, Transport};

/// Work the event loop hands to the engine. Scope and request ids are plain
/// strings here; the engine does not interpret them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Subscribe {
        scope: String,
        event: String,
    },
    Unsubscribe {
        scope: String,
        event: String,
    },
    Emit {
        scope: String,
        request_id: String,
        event: String,
        payload: Value,
    },
    CancelBackendJob {
        scope: String,
        request_id: String,
    },
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    runtime: tokio::runtime::Handle,
}

impl EngineHandle {
    pub fn new(
        transport: Arc<dyn Transport>,
        canceller: Arc<dyn BackendCanceller>,
    ) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let handle = runtime.handle().clone();

        thread::spawn(move || {
            let mut worker = Worker {
                transport,
                canceller,
                event_tx,
                subscriptions: HashMap::new(),
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            courier_debug!("Engine command channel closed; worker exiting");
        });

        Ok(Self {
            cmd_tx,
            event_rx,
            runtime: handle,
        })
    }

    /// Runtime that engine-side jobs (such as the loopback backend) should spawn on.
    pub fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.runtime.clone()
    }

    pub fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            courier_warn!("Engine worker has stopped; command dropped");
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    canceller: Arc<dyn BackendCanceller>,
    event_tx: mpsc::Sender<EngineEvent>,
    subscriptions: HashMap<(String, String), SubscriptionId>,
}

impl Worker {
    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::Subscribe { scope, event } => self.subscribe(scope, event),
            EngineCommand::Unsubscribe { scope, event } => {
                let Some(id) = self.subscriptions.remove(&(scope.clone(), event.clone())) else {
                    return;
                };
                if let Err(err) = self.transport.unsubscribe(&event, Some(id)) {
                    courier_warn!("Unsubscribe {} for {} failed: {}", event, scope, err);
                }
            }
            EngineCommand::Emit {
                scope,
                request_id,
                event,
                payload,
            } => match self.transport.emit(&event, payload) {
                Ok(0) => courier_warn!("No listener for {} ({})", event, request_id),
                Ok(_) => {}
                Err(error) => self.report(EngineEvent::EmitFailed {
                    scope,
                    request_id,
                    error,
                }),
            },
            EngineCommand::CancelBackendJob { scope, request_id } => {
                let canceller = self.canceller.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let outcome = canceller.cancel_job(&request_id).await;
                    let _ = event_tx.send(EngineEvent::CancelSettled {
                        scope,
                        request_id,
                        outcome,
                    });
                });
            }
        }
    }

    fn subscribe(&mut self, scope: String, event: String) {
        let key = (scope, event);
        if self.subscriptions.contains_key(&key) {
            return;
        }
        let event_tx = self.event_tx.clone();
        let result = self.transport.subscribe(
            &key.1,
            Arc::new(move |event: &str, payload: &Value| {
                let _ = event_tx.send(EngineEvent::Delivered {
                    event: event.to_string(),
                    payload: payload.clone(),
                });
            }),
        );
        match result {
            Ok(id) => {
                courier_debug!("Subscribed {} for {} (#{})", key.1, key.0, id);
                self.subscriptions.insert(key, id);
            }
            Err(error) => {
                let (scope, event) = key;
                self.report(EngineEvent::SubscribeFailed {
                    scope,
                    event,
                    error,
                });
            }
        }
    }

    fn report(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}
