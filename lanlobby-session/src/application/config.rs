use std::time::Duration;

/// Engine timing and queue sizing
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the host's roster broadcast
    pub broadcast_interval: Duration,

    /// Capacity of the runtime's command queue
    pub command_buffer: usize,

    /// Capacity of the runtime's event fan-out
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_secs(1),
            command_buffer: 64,
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}
