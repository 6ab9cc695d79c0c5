use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use courier_logging::courier_trace;
use serde_json::Value;

use crate::{SubscriptionId, TransportError};

/// Per-event listener cap, after which `subscribe` fails.
pub const DEFAULT_MAX_LISTENERS: usize = 16;

pub type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Named-event publish/subscribe.
///
/// Delivery is synchronous on the emitting thread. Handlers must not block.
pub trait Transport: Send + Sync {
    /// Returns how many handlers saw the payload.
    fn emit(&self, event: &str, payload: Value) -> Result<usize, TransportError>;
    fn subscribe(&self, event: &str, handler: Handler) -> Result<SubscriptionId, TransportError>;
    /// Removes one subscription, or every subscription for `event` when `id` is `None`.
    fn unsubscribe(&self, event: &str, id: Option<SubscriptionId>)
        -> Result<usize, TransportError>;
}

struct BusInner {
    next_id: SubscriptionId,
    closed: bool,
    max_listeners: usize,
    listeners: HashMap<String, Vec<(SubscriptionId, Handler)>>,
}

/// In-process [`Transport`]. Clones share the same listener table.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 1,
                closed: false,
                max_listeners,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Drops every listener; later emits and subscribes fail with [`TransportError::Closed`].
    pub fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.lock()?;
        inner.closed = true;
        inner.listeners.clear();
        Ok(())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock()
            .map(|inner| inner.listeners.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BusInner>, TransportError> {
        self.inner.lock().map_err(|_| TransportError::Poisoned)
    }
}

impl Transport for EventBus {
    fn emit(&self, event: &str, payload: Value) -> Result<usize, TransportError> {
        let handlers: Vec<Handler> = {
            let inner = self.lock()?;
            if inner.closed {
                return Err(TransportError::Closed);
            }
            inner
                .listeners
                .get(event)
                .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
                .unwrap_or_default()
        };
        // Invoked without the lock so handlers may emit or subscribe themselves.
        for handler in &handlers {
            handler(event, &payload);
        }
        courier_trace!("Emitted {} to {} handler(s)", event, handlers.len());
        Ok(handlers.len())
    }

    fn subscribe(&self, event: &str, handler: Handler) -> Result<SubscriptionId, TransportError> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Err(TransportError::Closed);
        }
        let limit = inner.max_listeners;
        let id = inner.next_id;
        let list = inner.listeners.entry(event.to_string()).or_default();
        if list.len() >= limit {
            return Err(TransportError::ListenerLimit {
                event: event.to_string(),
                limit,
            });
        }
        list.push((id, handler));
        inner.next_id += 1;
        Ok(id)
    }

    fn unsubscribe(
        &self,
        event: &str,
        id: Option<SubscriptionId>,
    ) -> Result<usize, TransportError> {
        let mut inner = self.lock()?;
        let Some(list) = inner.listeners.get_mut(event) else {
            return Ok(0);
        };
        let before = list.len();
        match id {
            Some(id) => list.retain(|(existing, _)| *existing != id),
            None => list.clear(),
        }
        let removed = before - list.len();
        if list.is_empty() {
            inner.listeners.remove(event);
        }
        Ok(removed)
    }
}
