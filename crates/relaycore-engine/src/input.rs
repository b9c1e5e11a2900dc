//! Validation, enqueueing, and dispatch of inbound messages (§4.4).
//!
//! `Put` is the only synchronous boundary a transport touches: it validates,
//! stamps session activity, and enqueues without blocking. `Process` is the
//! long-running loop that drains the shared queue and spawns one isolated
//! dispatch task per message, so a panicking handler can never take the
//! whole engine down with it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use relaycore_protocol::{HandlerError, JsonRpcErrorCode};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::capability::{method_not_found_error, CapabilityRegistry};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::Message;
use crate::session::Session;

/// A validator gets a read-only look at an inbound message before it is
/// enqueued and may reject it. Snapshotted under a brief lock on every
/// `put`, so registration is expected to be rare (startup-time), not
/// per-message.
pub type Validator = Arc<dyn Fn(&Message) -> Result<(), String> + Send + Sync>;

/// Shared dispatch machinery: one instance is wired to every session's
/// input side. Owns the method registry and the bounded queue that
/// decouples transport I/O from handler execution.
pub struct InputProcessor {
    registry: Arc<CapabilityRegistry>,
    validators: parking_lot::RwLock<Vec<Validator>>,
    tx: mpsc::Sender<Message>,
    rx: parking_lot::Mutex<Option<mpsc::Receiver<Message>>>,
}

impl InputProcessor {
    pub fn new(registry: Arc<CapabilityRegistry>, config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.input_queue_capacity.max(1));
        Self {
            registry,
            validators: parking_lot::RwLock::new(Vec::new()),
            tx,
            rx: parking_lot::Mutex::new(Some(rx)),
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Register a validator consulted by every future `put`.
    pub fn add_validator(&self, validator: Validator) {
        self.validators.write().push(validator);
    }

    /// Register a capability that negotiates the server side of the
    /// initialize handshake (§4.2, `AddServerCapability`).
    pub fn add_server_capability(&self, capability: Arc<dyn crate::capability::Capability>) {
        self.registry.add_server_capability(capability);
    }

    /// Register a capability that negotiates the client side of the
    /// initialize handshake (§4.2, `AddClientCapability`).
    pub fn add_client_capability(&self, capability: Arc<dyn crate::capability::Capability>) {
        self.registry.add_client_capability(capability);
    }

    /// Validate and enqueue a single message, non-blocking. On a full
    /// queue, a request (a message carrying an id and a method) gets a
    /// synthetic "processor busy" error response instead of silently
    /// vanishing; a notification or response is simply dropped with a log.
    pub fn put(&self, session: &Session, msg: Message) -> EngineResult<()> {
        for validator in self.validators.read().iter() {
            if let Err(reason) = validator(&msg) {
                warn!(session_id = %session.id(), reason, "message rejected by validator");
                return Err(EngineError::Handler(reason));
            }
        }

        session.update_last_activity();

        let is_request = msg.id.is_some() && msg.method.is_some();
        let id = msg.id.clone();

        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %session.id(), "input queue full");
                if is_request {
                    if let Some(id) = id {
                        let busy = JsonRpcErrorCode::ServerError.into_error("processor busy, request dropped".to_string());
                        let _ = session.send_response(id, Err(busy), false);
                    }
                }
                Err(EngineError::InputOverflow)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::InputOverflow),
        }
    }

    /// Parse raw bytes into messages and `put` each one.
    pub fn put_bytes(&self, session: &Session, bytes: &[u8]) -> EngineResult<()> {
        let messages = crate::message::parse_messages(session, bytes)?;
        for msg in messages {
            self.put(session, msg)?;
        }
        Ok(())
    }

    /// Drain the shared queue, dispatching each message in its own spawned
    /// task so a handler panic is caught and reported rather than
    /// propagating. Returns once the queue is closed and drained; a
    /// transport typically spawns this once per process and never awaits it
    /// to completion.
    pub async fn process(self: &Arc<Self>) {
        let mut rx = match self.rx.lock().take() {
            Some(rx) => rx,
            None => {
                error!("InputProcessor::process called more than once");
                return;
            }
        };

        while let Some(msg) = rx.recv().await {
            let registry = Arc::clone(&self.registry);
            tokio::spawn(run_dispatch(registry, msg));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

/// Classify and dispatch a single message, isolated in its own task.
///
/// - `notifications/*`: always silent (I4), even if an id is attached.
/// - method + id: look up a handler, invoke it, and send back a response.
/// - method, no id: a notification; log and drop handler errors rather than
///   reply (there is no id to reply to).
/// - no method, id present: forward to the session's `RequestManager` as a
///   response to a server-initiated request.
/// - neither: malformed input that slipped past parsing; log and drop.
fn run_dispatch(
    registry: Arc<CapabilityRegistry>,
    msg: Message,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let Some(session) = msg.session.clone() else {
            warn!("dropping message with no owning session");
            return;
        };

        match (&msg.id, &msg.method) {
            // I4: a `notifications/*` method never produces a reply, even if
            // the peer erroneously attached an id.
            (_, Some(method)) if relaycore_protocol::namespace::is_notification_method(method) => {
                handle_notification(registry, session, method.clone(), msg.params).await;
            }
            (Some(id), Some(method)) => {
                handle_request(registry, session, id.clone(), method.clone(), msg.params).await;
            }
            (None, Some(method)) => {
                handle_notification(registry, session, method.clone(), msg.params).await;
            }
            (Some(_), None) => {
                session.request_manager().process_response(msg);
            }
            (None, None) => {
                warn!("dropping message with neither id nor method");
            }
        }
    })
}

async fn handle_request(
    registry: Arc<CapabilityRegistry>,
    session: Session,
    id: relaycore_protocol::RequestId,
    method: String,
    params: Option<serde_json::Value>,
) {
    let is_initialize = method == relaycore_protocol::namespace::INITIALIZE_METHOD;
    let outcome = match registry.dispatch(&method) {
        Some(handler) => invoke_handler(handler, params, session.clone()).await,
        None => Err(method_not_found_error(&method)),
    };
    if let Err(e) = session.send_response(id, outcome, is_initialize) {
        warn!(method, error = %e, "failed to deliver response");
    }
}

async fn handle_notification(
    registry: Arc<CapabilityRegistry>,
    session: Session,
    method: String,
    params: Option<serde_json::Value>,
) {
    let Some(handler) = registry.dispatch(&method) else {
        if relaycore_protocol::namespace::is_notification_method(&method) {
            debug!(method, "no handler registered for notification");
        } else {
            warn!(method, "no handler for notification-shaped method");
        }
        return;
    };
    if let Err(e) = invoke_handler(handler, params, session).await {
        warn!(method, error = %e.message, "notification handler returned an error (no reply possible)");
    }
}

/// Run a handler with its panic caught and turned into an internal-error
/// response, so a panicking handler can never stall or crash the whole
/// process — only the request it was handling.
async fn invoke_handler(
    handler: crate::capability::HandlerFn,
    params: Option<serde_json::Value>,
    session: Session,
) -> Result<serde_json::Value, relaycore_protocol::JsonRpcError> {
    let future = handler(params, session);
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.map_err(HandlerError::into_wire_error),
        Err(panic) => {
            let reason = panic_message(&panic);
            error!(reason, "handler panicked");
            Err(JsonRpcErrorCode::InternalError.into_error(format!("handler panicked: {reason}")))
        }
    }
}
