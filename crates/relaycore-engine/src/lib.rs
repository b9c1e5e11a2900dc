//! The stateful session and dispatch engine: sessions, capability
//! registration, request correlation, and the input processor that ties
//! them together.
//!
//! Wire-level concerns (framing, error codes, stream-event shape) live in
//! `relaycore-protocol`; this crate is where a message becomes something a
//! handler actually runs against.

pub mod capability;
pub mod config;
pub mod error;
pub mod input;
pub mod message;
pub mod request_manager;
pub mod session;

pub use capability::{Capability, CapabilityRegistry, CapabilityRole, HandlerFn, HandlerFuture};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{EngineError, EngineResult};
pub use input::{InputProcessor, Validator};
pub use message::{parse_messages, Message};
pub use request_manager::{RequestManager, ResponseCallback};
pub use session::{OutputGuard, Session, SessionStatus};
