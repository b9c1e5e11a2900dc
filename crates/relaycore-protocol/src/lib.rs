//! Wire-level JSON-RPC 2.0 types, error taxonomy, and SSE stream-event
//! framing for the relaycore session and dispatch engine.
//!
//! This crate has no notion of a session, a transport, or a handler — it
//! only knows how to parse, classify, and serialize JSON-RPC messages. The
//! stateful pieces (sessions, request correlation, handler dispatch) live in
//! `relaycore-engine`, which depends on this crate.

pub mod error;
pub mod jsonrpc;
pub mod namespace;
pub mod stream_event;

pub use error::{ErrorKind, HandlerError, ProtocolError, StructuredError};
pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, RequestId, ResponseId,
};
pub use stream_event::{ArtifactUpdate, StatusUpdate, StreamEvent, StreamEventPayload};
