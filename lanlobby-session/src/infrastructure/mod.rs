pub mod error;
pub mod memory;
pub mod message;
pub mod transport;

pub use error::TransportError;
pub use memory::{MemoryNetwork, MemoryTransport};
pub use message::{MessageKind, SessionMessage};
pub use transport::{
    event_channel, EventSink, LatencyProbe, LinkLoss, ListenConfig, LocalEndpoint, Recipients,
    Transport, TransportEvent,
};
