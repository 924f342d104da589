//! Session membership and replication engine
//!
//! A host keeps the authoritative roster, probes every member's round-trip
//! time and pushes a rendered listing to all peers once per broadcast cycle.
//! Clients replace their mirror wholesale on every update.

// Application layer (controller, collaborators, runtime)
pub mod application;

// Error types
pub mod error;

// Infrastructure layer (transport seam, wire format, in-memory network)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    BroadcastScheduler, DispatchedEvent, EventDispatcher, LivenessProber, MessageRouter,
    ProbeStatus, SessionConfig, SessionContext, SessionController, SessionHandle, SessionRuntime,
    SessionSnapshot,
};
pub use error::{Result, SessionError};
pub use infrastructure::{
    event_channel, EventSink, LatencyProbe, LinkLoss, ListenConfig, LocalEndpoint, MemoryNetwork,
    MemoryTransport, MessageKind, Recipients, SessionMessage, Transport, TransportError,
    TransportEvent,
};
