//! Out-of-band stream events carried over SSE for long-lived A2A tasks.
//!
//! A stream event never coexists with a regular JSON-RPC body on the same
//! [`crate::message`](super)-level envelope; it is rendered by the transport
//! as an SSE frame instead. The `final` flag tells the transport it may
//! close the stream once this event has been delivered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task status transition, mirroring the terminal/non-terminal states a
/// long-running A2A task moves through (`working`, `input_required`, and
/// the terminal `completed` / `failed` / `cancelled`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An incremental artifact produced by a task (a file, a partial result, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactUpdate {
    pub name: String,
    pub data: Value,
}

/// The payload of a stream event: either a status transition or an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEventPayload {
    Status(StatusUpdate),
    Artifact(ArtifactUpdate),
}

/// A single SSE-carried update for an in-flight A2A task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub payload: StreamEventPayload,
    /// When true, the transport may close the stream after delivering this
    /// event — no further events will follow for this task.
    pub is_final: bool,
}

impl StreamEvent {
    pub fn status(state: impl Into<String>, message: Option<String>) -> Self {
        Self {
            payload: StreamEventPayload::Status(StatusUpdate {
                state: state.into(),
                message,
            }),
            is_final: false,
        }
    }

    pub fn artifact(name: impl Into<String>, data: Value) -> Self {
        Self {
            payload: StreamEventPayload::Artifact(ArtifactUpdate {
                name: name.into(),
                data,
            }),
            is_final: false,
        }
    }

    /// Mark this event as the last one for its task.
    pub fn finished(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// The SSE `event:` field a transport should emit for this payload.
    pub fn sse_event_name(&self) -> &'static str {
        match self.payload {
            StreamEventPayload::Status(_) => "status",
            StreamEventPayload::Artifact(_) => "artifact",
        }
    }
}
