//! Error taxonomy shared across the engine.
//!
//! [`ErrorKind`] names every failure path the core distinguishes (not Rust
//! type names — a classification used for logging and for picking a
//! JSON-RPC error code). [`ProtocolError`] is the concrete error type
//! returned by the wire-level decode/encode helpers in [`crate::jsonrpc`].

use crate::jsonrpc::{JsonRpcError, JsonRpcErrorCode};

/// Failure classification used across parsing, dispatch, and sessions.
///
/// This is deliberately not a 1:1 mirror of [`JsonRpcErrorCode`]: several
/// kinds here (e.g. `SessionClosed`, `OutputOverflow`) never reach the wire
/// as a JSON-RPC error at all — they are logged and the send is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    HandlerInternal,
    HandlerPanic,
    Unauthorized,
    SessionClosed,
    OutputOverflow,
    UnknownResponse,
}

impl ErrorKind {
    /// The JSON-RPC error code a peer sees for kinds that do surface as a
    /// wire-level error. Kinds that never reach the wire still map to a
    /// sensible code for completeness / internal logging.
    pub const fn wire_code(self) -> JsonRpcErrorCode {
        match self {
            Self::Parse => JsonRpcErrorCode::ParseError,
            Self::InvalidRequest => JsonRpcErrorCode::InvalidRequest,
            Self::MethodNotFound => JsonRpcErrorCode::MethodNotFound,
            Self::InvalidParams => JsonRpcErrorCode::InvalidParams,
            Self::HandlerInternal | Self::HandlerPanic => JsonRpcErrorCode::InternalError,
            Self::Unauthorized => JsonRpcErrorCode::Unauthorized,
            Self::SessionClosed | Self::OutputOverflow | Self::UnknownResponse => {
                JsonRpcErrorCode::ServerError
            }
        }
    }
}

/// Errors raised by the wire-level parse/serialize helpers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The bytes did not decode as a JSON-RPC request, notification,
    /// response, or batch thereof.
    #[error("parse error: {0}")]
    Parse(String),

    /// The message decoded, but violates a JSON-RPC structural invariant
    /// (e.g. carries neither `method` nor `id`).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// A handler-raised error that hasn't yet been classified as a structured
/// JSON-RPC error. Wrapping it as `-32603` preserves the message; a handler
/// that already returns a structured [`JsonRpcError`] should use
/// [`HandlerError::Structured`] instead so it passes through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Structured(#[from] StructuredError),
}

/// A pre-built JSON-RPC error a handler wants delivered verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {}", .0.code, .0.message)]
pub struct StructuredError(pub JsonRpcError);

impl HandlerError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Convert this handler error into the wire error the peer will see.
    pub fn into_wire_error(self) -> JsonRpcError {
        match self {
            Self::Message(message) => JsonRpcErrorCode::InternalError.into_error(message),
            Self::Structured(StructuredError(error)) => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_spec_table() {
        assert_eq!(ErrorKind::Parse.wire_code().code(), -32700);
        assert_eq!(ErrorKind::InvalidRequest.wire_code().code(), -32600);
        assert_eq!(ErrorKind::MethodNotFound.wire_code().code(), -32601);
        assert_eq!(ErrorKind::InvalidParams.wire_code().code(), -32602);
        assert_eq!(ErrorKind::HandlerInternal.wire_code().code(), -32603);
        assert_eq!(ErrorKind::HandlerPanic.wire_code().code(), -32603);
        assert_eq!(ErrorKind::Unauthorized.wire_code().code(), -32001);
    }

    #[test]
    fn handler_message_wraps_as_internal_error() {
        let wire = HandlerError::internal("boom").into_wire_error();
        assert_eq!(wire.code, -32603);
        assert_eq!(wire.message, "boom");
    }

    #[test]
    fn structured_handler_error_passes_through() {
        let structured = JsonRpcErrorCode::Unauthorized.into_error("nope".into());
        let handler_err = HandlerError::Structured(StructuredError(structured));
        let wire = handler_err.into_wire_error();
        assert_eq!(wire.code, -32001);
        assert_eq!(wire.message, "nope");
    }
}
