//! The universal message envelope (§3 of the data model).
//!
//! A [`Message`] is richer than the wire-level [`JsonRpcMessage`]: it also
//! carries the fields that only make sense inside the engine — a back
//! reference to the owning [`crate::session::Session`], a creation
//! timestamp, and the dispatcher's idempotency flag — none of which are
//! ever serialized.

use std::time::Instant;

use relaycore_protocol::jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload,
};
use relaycore_protocol::{ProtocolError, RequestId, ResponseId, StreamEvent};
use serde_json::Value;

use crate::session::Session;

/// The universal message envelope flowing through the input processor and
/// the session's output queue.
///
/// Invariants (see §3):
/// - `id` absent implies `method` present (a pure notification).
/// - `method` absent implies `id` present (it is a response).
/// - At most one of `result` / `error` is set.
/// - `stream_event` never coexists with `result`/`error`/`params`.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Option<RequestId>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
    pub stream_event: Option<StreamEvent>,
    pub timestamp: Instant,
    pub session: Option<Session>,
    pub processed: bool,
}

impl Message {
    fn bare() -> Self {
        Self {
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
            stream_event: None,
            timestamp: Instant::now(),
            session: None,
            processed: false,
        }
    }

    /// Build a request/notification message bound for delivery to a peer.
    pub fn outbound_request(id: Option<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            id,
            ..Self::bare()
        }
    }

    /// Build a success response message.
    pub fn response_ok(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::bare()
        }
    }

    /// Build an error response message.
    pub fn response_err(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            id: Some(id),
            error: Some(error),
            ..Self::bare()
        }
    }

    /// Build a message carrying a stream event (never has a regular body).
    pub fn stream(id: Option<RequestId>, event: StreamEvent) -> Self {
        Self {
            id,
            stream_event: Some(event),
            ..Self::bare()
        }
    }

    /// True if this message is a notification: no id, a method.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    /// True if this message is a response: no method.
    pub fn is_response(&self) -> bool {
        self.method.is_none()
    }

    /// Attach the owning session (never serialized).
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Convert to the wire-level representation, per the serialize contract
    /// in §4.4: error present wins, then result, else a request/notification
    /// shape. Returns `None` for pure stream-event carriers, which are never
    /// framed as JSON-RPC (the transport renders them as SSE instead).
    pub fn to_wire(&self) -> Option<JsonRpcMessage> {
        if self.stream_event.is_some() {
            return None;
        }
        if let Some(error) = &self.error {
            let id = self.id.clone().unwrap_or(RequestId::Number(0));
            return Some(JsonRpcMessage::Response(JsonRpcResponse {
                jsonrpc: Default::default(),
                payload: JsonRpcResponsePayload::Error { error: error.clone() },
                id: if self.id.is_some() {
                    ResponseId::from_request(id)
                } else {
                    ResponseId::null()
                },
            }));
        }
        if let Some(result) = &self.result {
            let id = self.id.clone().expect("a success response always carries an id");
            return Some(JsonRpcMessage::Response(JsonRpcResponse::success(id, result.clone())));
        }
        match (&self.id, &self.method) {
            (Some(id), Some(method)) => Some(JsonRpcMessage::Request(JsonRpcRequest::new(
                method.clone(),
                self.params.clone(),
                id.clone(),
            ))),
            (None, Some(method)) => Some(JsonRpcMessage::Notification(JsonRpcNotification::new(
                method.clone(),
                self.params.clone(),
            ))),
            _ => None,
        }
    }

    fn from_wire(wire: JsonRpcMessage, session: Option<&Session>) -> Self {
        let mut msg = match wire {
            JsonRpcMessage::Request(req) => Self {
                id: Some(req.id),
                method: Some(req.method),
                params: req.params,
                ..Self::bare()
            },
            JsonRpcMessage::Notification(n) => Self {
                id: None,
                method: Some(n.method),
                params: n.params,
                ..Self::bare()
            },
            JsonRpcMessage::Response(resp) => {
                let id = resp.id.as_request_id().cloned();
                match resp.payload {
                    JsonRpcResponsePayload::Success { result } => Self {
                        id,
                        result: Some(result),
                        ..Self::bare()
                    },
                    JsonRpcResponsePayload::Error { error } => Self {
                        id,
                        error: Some(error),
                        ..Self::bare()
                    },
                }
            }
        };
        msg.session = session.cloned();
        msg
    }
}

/// Parse raw transport bytes into zero or more `Message`s, stamping each
/// with a reference to `session`. Mirrors `ParseMessages(session, bytes)`
/// from §4.4: batch decode is attempted first, then a single object.
pub fn parse_messages(session: &Session, bytes: &[u8]) -> Result<Vec<Message>, ProtocolError> {
    let wire_messages = relaycore_protocol::jsonrpc::decode(bytes)?;
    Ok(wire_messages
        .into_iter()
        .map(|wire| Message::from_wire(wire, Some(session)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::input::InputProcessor;
    use crate::request_manager::RequestManager;
    use relaycore_protocol::JsonRpcErrorCode;
    use serde_json::json;
    use std::sync::Arc;

    fn test_session() -> Session {
        let registry = Arc::new(CapabilityRegistry::new());
        let input = Arc::new(InputProcessor::new(registry, Default::default()));
        Session::new(None, input, RequestManager::new(), Default::default())
    }

    #[test]
    fn response_serializes_exactly_one_body_field() {
        let ok = Message::response_ok(RequestId::Number(1), json!({"m": "hi"}));
        let wire = ok.to_wire().unwrap();
        let text = serde_json::to_string(&wire).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("result").is_some());
        assert!(value.get("error").is_none());

        let err = Message::response_err(RequestId::Number(2), JsonRpcErrorCode::MethodNotFound.into());
        let wire = err.to_wire().unwrap();
        let text = serde_json::to_string(&wire).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("error").is_some());
        assert!(value.get("result").is_none());
    }

    #[test]
    fn stream_event_never_frames_as_jsonrpc() {
        let msg = Message::stream(Some(RequestId::Number(1)), StreamEvent::status("working", None));
        assert!(msg.to_wire().is_none());
    }

    #[test]
    fn round_trip_preserves_notification_shape() {
        let session = test_session();
        let bytes = br#"{"jsonrpc":"2.0","method":"notifications/ping"}"#;
        let messages = parse_messages(&session, bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_notification());
        let wire = messages[0].to_wire().unwrap();
        assert!(matches!(wire, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn round_trip_preserves_request_shape() {
        let session = test_session();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"m":"hi"}}"#;
        let messages = parse_messages(&session, bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_notification());
        assert!(!messages[0].is_response());
        assert_eq!(messages[0].session.as_ref().map(|s| s.id().to_string()), Some(session.id().to_string()));
    }

    #[test]
    fn round_trip_preserves_response_shape() {
        let session = test_session();
        let bytes = br#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#;
        let messages = parse_messages(&session, bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_response());
    }
}
