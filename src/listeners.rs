/// Channel listener registry: at most one transport subscription per event type
///
/// Views mount and remount independently and each asks for the events it
/// needs. Without this registry every mount would open its own transport
/// subscription, multiplying keep-alive traffic and delivering every event N
/// times. The registry opens one subscription per event type on first
/// request and fans received payloads out to every registered handler.
use crate::types::BroadcastPayload;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const TRANSPORT_CHANNEL_CAPACITY: usize = 256;

/// One JSON message as delivered by the push transport
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Handle to the persistent push channel.
///
/// Registration is accepted whether or not the channel is currently
/// connected; events published while no dispatcher is listening are simply
/// not replayed (at-most-once across a disconnect).
#[derive(Clone)]
pub struct Transport {
    sender: broadcast::Sender<TransportMessage>,
}

impl Transport {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TRANSPORT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver one message to every open subscription
    pub fn publish(&self, event_type: &str, payload: serde_json::Value) {
        let _ = self.sender.send(TransportMessage {
            event_type: event_type.to_string(),
            payload,
        });
    }

    /// Convenience for the common case
    pub fn publish_broadcast(&self, event_type: &str, payload: &BroadcastPayload) {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(event_type, value),
            Err(e) => warn!("Failed to encode broadcast payload: {}", e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportMessage> {
        self.sender.subscribe()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

type Handler = Box<dyn Fn(&serde_json::Value) + Send + Sync>;
type HandlerMap = Arc<RwLock<HashMap<u64, Handler>>>;

/// Opaque receipt for one logical registration; pass to `unsubscribe`
#[derive(Debug)]
pub struct ListenerHandle {
    event_type: String,
    handler_id: u64,
}

struct Dispatcher {
    handlers: HandlerMap,
}

/// Owns one dispatcher per event type.
///
/// Constructed once at the application root and threaded through, so tests
/// can build a fresh registry per case instead of sharing module globals.
pub struct ListenerRegistry {
    transport: Transport,
    dispatchers: RwLock<HashMap<String, Dispatcher>>,
    next_handler_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            dispatchers: RwLock::new(HashMap::new()),
            next_handler_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `event_type`, opening the underlying
    /// subscription only if this is the first registration for that type.
    pub fn ensure_listener<F>(&self, event_type: &str, handler: F) -> ListenerHandle
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let handler_id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);

        let mut dispatchers = self
            .dispatchers
            .write()
            .unwrap_or_else(|e| e.into_inner());

        let dispatcher = dispatchers.entry(event_type.to_string()).or_insert_with(|| {
            debug!("Opening subscription for event type '{}'", event_type);
            let handlers: HandlerMap = Arc::new(RwLock::new(HashMap::new()));
            spawn_dispatch_task(
                self.transport.subscribe(),
                event_type.to_string(),
                handlers.clone(),
            );
            Dispatcher { handlers }
        });

        dispatcher
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handler_id, Box::new(handler));

        ListenerHandle {
            event_type: event_type.to_string(),
            handler_id,
        }
    }

    /// Remove one logical registration. The underlying subscription stays
    /// open for the process lifetime even with zero handlers left; it is
    /// never reopened.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        let dispatchers = self.dispatchers.read().unwrap_or_else(|e| e.into_inner());
        if let Some(dispatcher) = dispatchers.get(&handle.event_type) {
            dispatcher
                .handlers
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&handle.handler_id);
            debug!(
                "Unsubscribed handler {} from '{}'",
                handle.handler_id, handle.event_type
            );
        }
    }

    /// Number of open underlying subscriptions for `event_type` (0 or 1)
    pub fn subscription_count(&self, event_type: &str) -> usize {
        let dispatchers = self.dispatchers.read().unwrap_or_else(|e| e.into_inner());
        usize::from(dispatchers.contains_key(event_type))
    }

    /// Number of logical handlers registered for `event_type`
    pub fn handler_count(&self, event_type: &str) -> usize {
        let dispatchers = self.dispatchers.read().unwrap_or_else(|e| e.into_inner());
        dispatchers
            .get(event_type)
            .map(|d| d.handlers.read().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }
}

fn spawn_dispatch_task(
    mut rx: broadcast::Receiver<TransportMessage>,
    event_type: String,
    handlers: HandlerMap,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if message.event_type != event_type {
                        continue;
                    }
                    let handlers = handlers.read().unwrap_or_else(|e| e.into_inner());
                    for handler in handlers.values() {
                        handler(&message.payload);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Dispatcher fell behind the transport; skip and continue
                    warn!("Listener for '{}' lagged {} events", event_type, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Transport closed, stopping '{}' dispatcher", event_type);
                    break;
                }
            }
        }
    });
}
