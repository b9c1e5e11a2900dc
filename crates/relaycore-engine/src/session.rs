//! The per-peer [`Session`] (§4.1).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use dashmap::DashMap;
use futures::Stream;
use relaycore_protocol::{JsonRpcError, RequestId, StreamEvent};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::input::InputProcessor;
use crate::message::Message;
use crate::request_manager::{RequestManager, ResponseCallback};

/// The session lifecycle (§4.1 state machine).
///
/// `Close` resets a session to `New` rather than a terminal `Closed` state —
/// this specification models a session as single-use regardless: the
/// `closed` flag on [`SessionInner`] is permanent and gates every send
/// independently of `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    New = 0,
    Connecting = 1,
    Connected = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Connecting,
            _ => Self::Connected,
        }
    }
}

struct SessionInner {
    id: Arc<str>,
    counter: AtomicU64,
    created_at: Instant,
    last_activity_millis: AtomicU64,
    status: AtomicU8,
    closed: AtomicBool,
    acquired: AtomicBool,
    output_tx: parking_lot::Mutex<Option<mpsc::Sender<Message>>>,
    output_rx: parking_lot::Mutex<Option<mpsc::Receiver<Message>>>,
    params: DashMap<String, Value>,
    request_manager: RequestManager,
    input: Arc<InputProcessor>,
    negotiated_version: parking_lot::Mutex<Option<String>>,
    span: tracing::Span,
}

/// A cheap, cloneable handle to per-peer session state. Every clone refers
/// to the same underlying session; there is exactly one `SessionInner`.
#[derive(Clone)]
pub struct Session(Arc<SessionInner>);

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.0.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Random 256-bit, URL-safe base64 session id.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl Session {
    /// Create a new session in the `New` state. `caller_id` lets a
    /// transport supply its own id instead of a random one.
    pub fn new(
        caller_id: Option<String>,
        input: Arc<InputProcessor>,
        request_manager: RequestManager,
        config: EngineConfig,
    ) -> Self {
        let id: Arc<str> = Arc::from(caller_id.unwrap_or_else(generate_session_id));
        let (tx, rx) = mpsc::channel(config.output_queue_capacity.max(1));
        let span = tracing::info_span!("session", session_id = %id);
        debug!(session_id = %id, created_at = %chrono::Utc::now().to_rfc3339(), "session created");
        Self(Arc::new(SessionInner {
            id,
            counter: AtomicU64::new(0),
            created_at: Instant::now(),
            last_activity_millis: AtomicU64::new(0),
            status: AtomicU8::new(SessionStatus::New as u8),
            closed: AtomicBool::new(false),
            acquired: AtomicBool::new(false),
            output_tx: parking_lot::Mutex::new(Some(tx)),
            output_rx: parking_lot::Mutex::new(Some(rx)),
            params: DashMap::new(),
            request_manager,
            input,
            negotiated_version: parking_lot::Mutex::new(None),
            span,
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn input(&self) -> &Arc<InputProcessor> {
        &self.0.input
    }

    pub fn request_manager(&self) -> &RequestManager {
        &self.0.request_manager
    }

    pub fn params(&self) -> &DashMap<String, Value> {
        &self.0.params
    }

    pub fn logger(&self) -> &tracing::Span {
        &self.0.span
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.0.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: SessionStatus) {
        debug!(session_id = %self.id(), ?status, "session status transition");
        self.0.status.store(status as u8, Ordering::Release);
    }

    pub fn set_negotiated_version(&self, version: impl Into<String>) {
        *self.0.negotiated_version.lock() = Some(version.into());
    }

    pub fn negotiated_version(&self) -> Option<String> {
        self.0.negotiated_version.lock().clone()
    }

    pub fn update_last_activity(&self) {
        let elapsed = self.0.created_at.elapsed().as_millis() as u64;
        self.0.last_activity_millis.store(elapsed, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Instant {
        let millis = self.0.last_activity_millis.load(Ordering::Relaxed);
        self.0.created_at + std::time::Duration::from_millis(millis)
    }

    /// Allocate the next monotonically increasing internal id, rendered as
    /// a JSON-RPC numeric id.
    pub fn next_message_id(&self) -> RequestId {
        let next = self.0.counter.fetch_add(1, Ordering::SeqCst) + 1;
        RequestId::Number(next as i64)
    }

    /// Exactly one consumer may hold the output queue at a time. Returns
    /// `None` if already acquired, or if the session is closed.
    pub fn acquire_output(&self) -> Option<OutputGuard> {
        if self.0.closed.load(Ordering::Acquire) {
            return None;
        }
        if self
            .0
            .acquired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        match self.0.output_rx.lock().take() {
            Some(receiver) => Some(OutputGuard {
                session: self.clone(),
                receiver: Some(receiver),
            }),
            None => {
                self.0.acquired.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Explicit release, equivalent to dropping the guard.
    pub fn release_output(&self, guard: OutputGuard) {
        drop(guard);
    }

    fn gate_send(&self, allow_while_connecting: bool) -> EngineResult<()> {
        if self.0.closed.load(Ordering::Acquire) {
            return Err(EngineError::SessionClosed {
                session_id: self.id().to_string(),
            });
        }
        let sendable = match self.status() {
            SessionStatus::Connected => true,
            SessionStatus::Connecting => allow_while_connecting,
            SessionStatus::New => false,
        };
        if sendable {
            Ok(())
        } else {
            warn!(session_id = %self.id(), status = ?self.status(), "dropping send on non-connected session");
            Err(EngineError::SessionClosed {
                session_id: self.id().to_string(),
            })
        }
    }

    fn enqueue(&self, msg: Message) -> EngineResult<()> {
        // Outbound messages don't carry an owning back-reference to this
        // session: `to_wire()` never reads `msg.session`, and attaching one
        // here would form a SessionInner -> Receiver -> Message ->
        // Arc<SessionInner> cycle for anything buffered with no consumer
        // acquired (§9 requires the reference to be non-owning). Only the
        // inbound/parse path (`Message::from_wire`) attaches a session, for
        // the dispatcher to read.
        let guard = self.0.output_tx.lock();
        match guard.as_ref() {
            Some(tx) => match tx.try_send(msg) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session_id = %self.id(), "output queue full, dropping send");
                    Err(EngineError::OutputOverflow {
                        session_id: self.id().to_string(),
                    })
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::SessionClosed {
                    session_id: self.id().to_string(),
                }),
            },
            None => Err(EngineError::SessionClosed {
                session_id: self.id().to_string(),
            }),
        }
    }

    /// Enqueue a response. `is_initialize_response` additionally permits
    /// the send while `status == Connecting`, since a client may not yet
    /// have emitted `notifications/initialized`.
    pub fn send_response(
        &self,
        id: RequestId,
        outcome: Result<Value, JsonRpcError>,
        is_initialize_response: bool,
    ) -> EngineResult<()> {
        self.gate_send(is_initialize_response)?;
        let msg = match outcome {
            Ok(result) => Message::response_ok(id, result),
            Err(error) => Message::response_err(id, error),
        };
        self.enqueue(msg)
    }

    pub fn send_notification(&self, method: impl Into<String>, params: Option<Value>) -> EngineResult<()> {
        self.gate_send(false)?;
        self.enqueue(Message::outbound_request(None, method, params))
    }

    /// Allocate an id, register the callback, and enqueue the request.
    pub fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        callback: ResponseCallback,
    ) -> EngineResult<RequestId> {
        self.gate_send(false)?;
        let id = self.next_message_id();
        self.request_manager().register_request(&id, callback);
        match self.enqueue(Message::outbound_request(Some(id.clone()), method, params)) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.request_manager().cancel(&id);
                Err(e)
            }
        }
    }

    /// `SendRequest` wrapped in a lazy sequence that auto-follows
    /// cursor-based pagination (§4.1, §8 P7): if a page's result decodes as
    /// `{nextCursor}`, a follow-up request is issued with
    /// `{cursor: nextCursor}` merged into the original params, using the
    /// same method, until a page has no cursor.
    pub fn send_request_sync(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> impl Stream<Item = Message> + Send + 'static {
        let session = self.clone();
        let method = method.into();
        async_stream::stream! {
            let mut cursor: Option<Value> = None;
            loop {
                let request_params = match (&params, &cursor) {
                    (base, Some(cursor_value)) => {
                        let mut merged = match base {
                            Some(Value::Object(map)) => map.clone(),
                            _ => serde_json::Map::new(),
                        };
                        merged.insert("cursor".to_string(), cursor_value.clone());
                        Some(Value::Object(merged))
                    }
                    (base, None) => base.clone(),
                };

                let (tx, rx) = oneshot::channel();
                let sent = session.send_request(
                    method.clone(),
                    request_params,
                    Box::new(move |msg| {
                        let _ = tx.send(msg);
                    }),
                );
                if sent.is_err() {
                    break;
                }
                let Ok(page) = rx.await else { break };

                let next_cursor = page
                    .result
                    .as_ref()
                    .and_then(|r| r.get("nextCursor"))
                    .filter(|c| !c.is_null())
                    .cloned();

                yield page;

                match next_cursor {
                    Some(c) => cursor = Some(c),
                    None => break,
                }
            }
        }
    }

    /// Enqueue an SSE-style stream event. Only permitted while connected.
    pub fn send_stream_event(&self, event: StreamEvent) -> EngineResult<()> {
        self.gate_send(false)?;
        self.enqueue(Message::stream(None, event))
    }

    /// Close the session. Idempotent: a second call logs "double close"
    /// and returns `Ok(())` without side effects.
    pub fn close(&self) -> EngineResult<()> {
        if self.0.closed.swap(true, Ordering::AcqRel) {
            warn!(session_id = %self.id(), "double close");
            return Ok(());
        }
        self.set_status(SessionStatus::New);
        self.0.request_manager.clear();
        self.0.output_tx.lock().take();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }
}

/// Exclusive single-consumer claim on a session's outbound queue (§4.1,
/// "output acquisition"). Dropping the guard releases the claim and returns
/// the receiver to the session for a future `acquire_output` call.
pub struct OutputGuard {
    session: Session,
    receiver: Option<mpsc::Receiver<Message>>,
}

impl OutputGuard {
    /// Await the next outbound message. Returns `None` once the session is
    /// closed and the queue has drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.as_mut()?.recv().await
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *self.session.0.output_rx.lock() = Some(receiver);
        }
        self.session.0.acquired.store(false, Ordering::Release);
    }
}
