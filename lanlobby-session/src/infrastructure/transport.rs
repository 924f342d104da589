use crate::infrastructure::error::Result;
use async_trait::async_trait;
use lanlobby_core::MemberId;
use std::net::{IpAddr, SocketAddrV4};
use std::time::Duration;
use tokio::sync::mpsc;

/// How a link to the host went away, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLoss {
    /// Orderly close by the remote side
    Closed,
    /// Timeout, reset or other failure
    Lost,
}

/// Raw callbacks delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Client side: the host accepted us
    ConnectedToHost {
        local_id: MemberId,
        host_id: MemberId,
    },

    /// Client side: the connect request failed
    ConnectFailed { reason: String },

    /// The session link went down (client: to the host; host: the listener)
    LinkDown { cause: LinkLoss },

    /// Host side: a peer connected
    PeerConnected { id: MemberId, address: IpAddr },

    /// Host side: a peer went away
    PeerDisconnected { id: MemberId },

    /// A payload arrived
    MessageReceived { from: MemberId, data: Vec<u8> },
}

/// Where transports push their events; consumed by a single session sequence
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Create the queue a transport delivers into
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<TransportEvent>) {
    mpsc::unbounded_channel()
}

/// Message recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// The session host (client side)
    Host,
    /// One specific peer
    Peer(MemberId),
    /// Every other session participant
    Everyone,
}

/// Parameters for starting a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenConfig {
    pub port: u16,
    /// Incoming connections allowed (the host itself is not one)
    pub max_connections: usize,
    pub nat_assist: bool,
}

/// What a successful listen resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEndpoint {
    /// Our own peer identifier
    pub id: MemberId,
    /// Address other members see us at
    pub address: IpAddr,
    /// Port actually bound
    pub port: u16,
}

/// Reliable, ordered session transport (allows mocking in tests)
///
/// Outcomes of `connect` and every remote happening arrive as
/// [`TransportEvent`]s on the sink the transport was built with. Local
/// `disconnect`/`kick` calls are not echoed back as events.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Start listening; resolves once the server is initialized
    async fn listen(&self, config: ListenConfig) -> Result<LocalEndpoint>;

    /// Request a connection; completes later with `ConnectedToHost` or `ConnectFailed`
    fn connect(&self, target: SocketAddrV4) -> Result<()>;

    /// Tear down whatever session link exists; idempotent
    fn disconnect(&self);

    /// Host side: drop a single peer
    fn kick(&self, peer: MemberId);

    fn send(&self, to: Recipients, data: Vec<u8>) -> Result<()>;

    fn has_public_address(&self) -> bool;
}

/// Round-trip time measurement towards a peer
#[async_trait]
pub trait LatencyProbe: Send + Sync + 'static {
    /// `None` when the probe fails; may also never resolve if packets are lost
    async fn probe(&self, target: MemberId, address: IpAddr) -> Option<Duration>;
}
