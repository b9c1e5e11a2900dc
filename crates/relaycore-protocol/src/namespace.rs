//! Method-name namespace classification (§6 of the wire-format contract).

/// Prefix marking a method as a pure notification: no response is ever sent,
/// even if the peer erroneously supplied an id.
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// Prefix marking a method as an A2A task method: it may emit SSE
/// [`crate::stream_event::StreamEvent`]s, and a handler error for these
/// methods is surfaced through the stream rather than as a JSON-RPC error,
/// when possible.
pub const TASK_PREFIX: &str = "tasks/";

/// The handshake method that negotiates protocol version and moves a
/// session from `Connecting` to `Connected`.
pub const INITIALIZE_METHOD: &str = "initialize";

/// Whether `method` is a pure notification regardless of whether the
/// message happened to carry an `id`.
pub fn is_notification_method(method: &str) -> bool {
    method.starts_with(NOTIFICATION_PREFIX)
}

/// Whether `method` is an A2A task method.
pub fn is_task_method(method: &str) -> bool {
    method.starts_with(TASK_PREFIX)
}
