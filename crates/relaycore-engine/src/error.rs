//! Engine-level error type.

use relaycore_protocol::ErrorKind;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors the engine itself can raise. Handler errors are not represented
/// here — they flow back as JSON-RPC error payloads via
/// [`relaycore_protocol::HandlerError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Wire-level parse/structure failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] relaycore_protocol::ProtocolError),

    /// A send was attempted on a session that is not in a sendable state.
    #[error("session {session_id} is closed")]
    SessionClosed { session_id: String },

    /// The session's output queue was full when a send was attempted.
    #[error("output queue full for session {session_id}")]
    OutputOverflow { session_id: String },

    /// The shared input queue was full when `Put` was called.
    #[error("input queue full")]
    InputOverflow,

    /// `AcquireOutput` was called while another consumer already holds the
    /// queue.
    #[error("output already acquired for session {session_id}")]
    AlreadyAcquired { session_id: String },

    /// A capability or handler lookup failed.
    #[error("no handler registered for method '{method}'")]
    MethodNotFound { method: String },

    /// A handler panicked while executing.
    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    /// Catch-all for handler-raised errors that don't need richer context.
    #[error("handler error: {0}")]
    Handler(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(e) => e.kind(),
            Self::SessionClosed { .. } => ErrorKind::SessionClosed,
            Self::OutputOverflow { .. } | Self::InputOverflow => ErrorKind::OutputOverflow,
            Self::AlreadyAcquired { .. } => ErrorKind::InvalidRequest,
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::HandlerPanic(_) => ErrorKind::HandlerPanic,
            Self::Handler(_) => ErrorKind::HandlerInternal,
        }
    }
}
