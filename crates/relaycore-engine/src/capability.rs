//! Capability bundles and the method → handler registry (§4.2, "Handler
//! registry").

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use relaycore_protocol::{HandlerError, JsonRpcErrorCode};
use serde_json::Value;
use tracing::warn;

use crate::session::Session;

/// A handler's return type.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// A registered method handler: takes the request/notification params and
/// the session it arrived on, and returns a result value or a handler
/// error (wrapped as -32603 unless it's already a structured error).
pub type HandlerFn = Arc<dyn Fn(Option<Value>, Session) -> HandlerFuture + Send + Sync>;

/// Which side of the initialize handshake a capability bundle negotiates
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityRole {
    Server,
    Client,
}

/// A bundle contributing a handler map and, depending on role, a
/// capability-descriptor setter consulted during the initialize handshake.
pub trait Capability: Send + Sync {
    /// The method → handler map this capability contributes.
    fn handlers(&self) -> HashMap<String, HandlerFn>;

    /// Which side of the handshake this capability negotiates for.
    fn role(&self) -> CapabilityRole {
        CapabilityRole::Server
    }

    /// Record the negotiated server capabilities descriptor (no-op unless
    /// this capability cares about it).
    fn set_server_capabilities(&self, _capabilities: Value) {}

    /// Record the negotiated client capabilities descriptor (no-op unless
    /// this capability cares about it).
    fn set_client_capabilities(&self, _capabilities: Value) {}
}

/// Concurrent method → handler map, built up by registering capability
/// bundles. Registration is rare (startup-time); lookups happen on every
/// dispatched message and never take a write lock.
///
/// Bundles registered via [`add_server_capability`](Self::add_server_capability)
/// and [`add_client_capability`](Self::add_client_capability) are also kept
/// in a role-tagged list, so the initialize handshake can later drive each
/// bundle's capability-descriptor setter (§3, §4.2).
#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: DashMap<String, HandlerFn>,
    not_found: parking_lot::RwLock<Option<HandlerFn>>,
    server_capabilities: parking_lot::RwLock<Vec<Arc<dyn Capability>>>,
    client_capabilities: parking_lot::RwLock<Vec<Arc<dyn Capability>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge_handlers(&self, capability: &Arc<dyn Capability>) {
        for (method, handler) in capability.handlers() {
            if self.handlers.contains_key(&method) {
                warn!(method = %method, "duplicate handler registration; last writer wins");
            }
            self.handlers.insert(method, handler);
        }
    }

    /// Register a capability that negotiates the server side of the
    /// initialize handshake: its handler map is merged in, and its
    /// `set_server_capabilities` will be invoked by
    /// [`negotiate_server_capabilities`](Self::negotiate_server_capabilities).
    pub fn add_server_capability(&self, capability: Arc<dyn Capability>) {
        if capability.role() != CapabilityRole::Server {
            warn!("capability added as server but declares a different role");
        }
        self.merge_handlers(&capability);
        self.server_capabilities.write().push(capability);
    }

    /// Register a capability that negotiates the client side of the
    /// initialize handshake: its handler map is merged in, and its
    /// `set_client_capabilities` will be invoked by
    /// [`negotiate_client_capabilities`](Self::negotiate_client_capabilities).
    pub fn add_client_capability(&self, capability: Arc<dyn Capability>) {
        if capability.role() != CapabilityRole::Client {
            warn!("capability added as client but declares a different role");
        }
        self.merge_handlers(&capability);
        self.client_capabilities.write().push(capability);
    }

    /// Propagate the peer's negotiated server-capabilities descriptor (as
    /// decoded from `initialize`) to every registered server capability.
    pub fn negotiate_server_capabilities(&self, descriptor: Value) {
        for capability in self.server_capabilities.read().iter() {
            capability.set_server_capabilities(descriptor.clone());
        }
    }

    /// Propagate the peer's negotiated client-capabilities descriptor to
    /// every registered client capability.
    pub fn negotiate_client_capabilities(&self, descriptor: Value) {
        for capability in self.client_capabilities.read().iter() {
            capability.set_client_capabilities(descriptor.clone());
        }
    }

    /// Register a single handler directly, bypassing the `Capability` trait.
    /// Useful for ad hoc methods registered outside a bundle.
    pub fn register_handler(&self, method: impl Into<String>, handler: HandlerFn) {
        let method = method.into();
        if self.handlers.contains_key(&method) {
            warn!(method = %method, "duplicate handler registration; last writer wins");
        }
        self.handlers.insert(method, handler);
    }

    /// Configure the fallback invoked when no handler matches a method. If
    /// none is configured, [`CapabilityRegistry::dispatch`] returns `None`
    /// and the caller is expected to synthesize a method-not-found error.
    pub fn set_not_found_handler(&self, handler: HandlerFn) {
        *self.not_found.write() = Some(handler);
    }

    /// Look up the handler for `method`, falling back to the configured
    /// not-found handler if any.
    pub fn dispatch(&self, method: &str) -> Option<HandlerFn> {
        self.handlers
            .get(method)
            .map(|entry| entry.value().clone())
            .or_else(|| self.not_found.read().clone())
    }

    /// Whether a handler is registered for exactly this method (ignores the
    /// not-found fallback).
    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

/// The default JSON-RPC error for an unmatched method (-32601).
pub fn method_not_found_error(method: &str) -> relaycore_protocol::JsonRpcError {
    JsonRpcErrorCode::MethodNotFound.into_error(format!("Method not found: {method}"))
}
