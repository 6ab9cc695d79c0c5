//! In-process stand-in for the inference backend.
//!
//! For every request event it emits progress steps and then exactly one
//! response carrying the same request id, mirroring what the real backend
//! promises. The request id is sent as `requestId`; the other response
//! fields use the backend's PascalCase names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier_logging::{courier_debug, courier_info, courier_warn};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{BackendCanceller, CancelError, EventBus, Transport, TransportError};

pub const CANCELLED_BY_USER: &str = "Operation cancelled by user";

const STEPS: [(u8, &str); 5] = [
    (5, "Preparing request"),
    (20, "Loading context"),
    (50, "Generating"),
    (80, "Finalizing"),
    (100, "Done"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackSettings {
    pub step_delay: Duration,
    /// Inputs containing this substring produce a backend failure. Empty disables it.
    pub failure_trigger: String,
}

impl Default for LoopbackSettings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(250),
            failure_trigger: "#fail".to_string(),
        }
    }
}

/// Event names the loopback answers for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackRoute {
    pub scope: String,
    pub request_event: String,
    pub response_event: String,
    pub progress_event: String,
    pub input_field: String,
}

pub struct LoopbackBackend {
    settings: LoopbackSettings,
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl LoopbackBackend {
    pub fn new(settings: LoopbackSettings) -> Self {
        Self {
            settings,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts answering the routes' request events on `bus`. Jobs run on `runtime`.
    pub fn attach(
        &self,
        bus: &EventBus,
        runtime: Handle,
        routes: Vec<LoopbackRoute>,
    ) -> Result<(), TransportError> {
        for route in routes {
            let route = Arc::new(route);
            let job_bus = bus.clone();
            let runtime = runtime.clone();
            let settings = self.settings.clone();
            let running = self.running.clone();
            let request_event = route.request_event.clone();
            bus.subscribe(
                &request_event,
                Arc::new(move |_event: &str, payload: &Value| {
                    let job = Job {
                        bus: job_bus.clone(),
                        route: route.clone(),
                        settings: settings.clone(),
                        running: running.clone(),
                    };
                    runtime.spawn(job.run(payload.clone()));
                }),
            )?;
            courier_debug!("Loopback listening on {}", request_event);
        }
        Ok(())
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().map(|running| running.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl BackendCanceller for LoopbackBackend {
    async fn cancel_backend_job(&self) -> Result<String, CancelError> {
        let running = self
            .running
            .lock()
            .map_err(|_| CancelError::Unavailable("job table poisoned".to_string()))?;
        if running.is_empty() {
            return Err(CancelError::NothingRunning);
        }
        for token in running.values() {
            token.cancel();
        }
        Ok(format!("Cancelled {} running job(s)", running.len()))
    }

    async fn cancel_job(&self, request_id: &str) -> Result<String, CancelError> {
        let running = self
            .running
            .lock()
            .map_err(|_| CancelError::Unavailable("job table poisoned".to_string()))?;
        let token = running.get(request_id).ok_or(CancelError::NothingRunning)?;
        token.cancel();
        Ok(format!("Cancelled {request_id}"))
    }
}

struct Job {
    bus: EventBus,
    route: Arc<LoopbackRoute>,
    settings: LoopbackSettings,
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Job {
    async fn run(self, request: Value) {
        let started = Instant::now();
        let Some(request_id) = request
            .get("requestId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
        else {
            courier_warn!("Loopback got {} without requestId", self.route.request_event);
            self.respond(json!({"Success": false, "Error": "invalid request data format"}));
            return;
        };
        let input = request
            .get(&self.route.input_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let token = CancellationToken::new();
        if let Ok(mut running) = self.running.lock() {
            running.insert(request_id.clone(), token.clone());
        }

        let mut cancelled = false;
        for (progress, message) in STEPS {
            tokio::select! {
                _ = token.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(self.settings.step_delay) => {}
            }
            let status = if progress == 100 { "completed" } else { "running" };
            self.emit(
                &self.route.progress_event,
                json!({
                    "requestId": request_id,
                    "progress": progress,
                    "message": message,
                    "status": status,
                }),
            );
        }

        if let Ok(mut running) = self.running.lock() {
            running.remove(&request_id);
        }

        let response = if cancelled {
            json!({"requestId": request_id, "Success": false, "Error": CANCELLED_BY_USER})
        } else if !self.settings.failure_trigger.is_empty()
            && input.contains(&self.settings.failure_trigger)
        {
            json!({"requestId": request_id, "Success": false, "Error": "simulated backend failure"})
        } else {
            json!({
                "requestId": request_id,
                "Success": true,
                "Result": format!("[{}] {}", self.route.scope, input),
                "ProcessingTime": started.elapsed().as_millis() as u64,
            })
        };
        courier_info!("Loopback finished {} (cancelled={})", request_id, cancelled);
        self.respond(response);
    }

    fn respond(&self, payload: Value) {
        self.emit(&self.route.response_event, payload);
    }

    fn emit(&self, event: &str, payload: Value) {
        if let Err(err) = self.bus.emit(event, payload) {
            courier_warn!("Loopback could not emit {}: {}", event, err);
        }
    }
}
