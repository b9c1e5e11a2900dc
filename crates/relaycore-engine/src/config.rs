//! Engine tunables.
//!
//! Queue sizes and similar knobs are deliberately few: the core does not
//! prescribe a deployment model, only the defaults a transport gets for
//! free if it doesn't override them.

/// Default bound for a session's outbound queue (§4.1, "recommended 100").
pub const DEFAULT_OUTPUT_QUEUE_CAPACITY: usize = 100;

/// Default bound for the shared input queue a transport's bytes land on
/// after `Input.Put` validates and enqueues them.
pub const DEFAULT_INPUT_QUEUE_CAPACITY: usize = 256;

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each session's bounded output queue.
    pub output_queue_capacity: usize,
    /// Capacity of the shared input queue.
    pub input_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_queue_capacity: DEFAULT_OUTPUT_QUEUE_CAPACITY,
            input_queue_capacity: DEFAULT_INPUT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    output_queue_capacity: Option<usize>,
    input_queue_capacity: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn output_queue_capacity(mut self, capacity: usize) -> Self {
        self.output_queue_capacity = Some(capacity);
        self
    }

    pub fn input_queue_capacity(mut self, capacity: usize) -> Self {
        self.input_queue_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            output_queue_capacity: self.output_queue_capacity.unwrap_or(defaults.output_queue_capacity),
            input_queue_capacity: self.input_queue_capacity.unwrap_or(defaults.input_queue_capacity),
        }
    }
}
