//! Tracks outstanding server-initiated requests and matches responses to
//! their callbacks (§4.3).

use std::time::Instant;

use dashmap::DashMap;
use tracing::warn;

use crate::message::Message;

/// Invoked exactly once with the response [`Message`] for the id it was
/// registered under.
pub type ResponseCallback = Box<dyn FnOnce(Message) + Send>;

struct PendingRequest {
    callback: ResponseCallback,
    #[allow(dead_code)] // available to a policy-layer timeout sweep; the core doesn't read it
    timestamp: Instant,
}

/// Correlates outbound server-initiated requests with their eventual
/// responses.
///
/// Lookup and removal are short, lock-protected operations (DashMap shards);
/// the callback itself runs with no lock held, so it may safely call back
/// into `SendRequest` without deadlocking.
#[derive(Default)]
pub struct RequestManager {
    pending: DashMap<String, PendingRequest>,
}

impl RequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a request id that was just sent.
    pub fn register_request(&self, id: &relaycore_protocol::RequestId, callback: ResponseCallback) {
        self.pending.insert(
            id.as_correlation_key(),
            PendingRequest {
                callback,
                timestamp: Instant::now(),
            },
        );
    }

    /// Match an inbound response to its callback. Returns `true` iff a
    /// callback was found (and has now been invoked and removed).
    pub fn process_response(&self, mut msg: Message) -> bool {
        let Some(id) = msg.id.clone() else {
            return false;
        };
        let key = id.as_correlation_key();
        match self.pending.remove(&key) {
            Some((_, pending)) => {
                msg.processed = true;
                (pending.callback)(msg);
                true
            }
            None => {
                warn!(id = %key, "response with no matching outstanding request");
                false
            }
        }
    }

    /// Number of outstanding requests. Exposed for tests and diagnostics.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Remove a pending entry without invoking its callback (used on
    /// session close: outstanding requests are implicitly cancelled by
    /// dropping further delivery, never by invoking their callback).
    pub fn cancel(&self, id: &relaycore_protocol::RequestId) {
        self.pending.remove(&id.as_correlation_key());
    }

    /// Drop every outstanding entry without invoking callbacks (session
    /// close, §5 "Cancellation").
    pub fn clear(&self) {
        self.pending.clear();
    }
}
