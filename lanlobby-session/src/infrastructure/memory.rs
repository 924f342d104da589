//! In-memory transport
//!
//! A shared `MemoryNetwork` routes sessions between `MemoryTransport`
//! instances living in the same process. Every event is pushed straight into
//! the destination's sink, so per-sink delivery is reliable and ordered.

use crate::infrastructure::error::{Result, TransportError};
use crate::infrastructure::transport::{
    EventSink, LatencyProbe, LinkLoss, ListenConfig, LocalEndpoint, Recipients, Transport,
    TransportEvent,
};
use async_trait::async_trait;
use lanlobby_core::MemberId;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Probe answer time for peers without an explicit latency
const DEFAULT_LATENCY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
enum Latency {
    Fixed(Duration),
    /// Probes never come back
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Detached,
    Hosting {
        bound: SocketAddrV4,
        peers: Vec<MemberId>,
        max_connections: usize,
    },
    Joined {
        host: MemberId,
    },
}

#[derive(Debug)]
struct Node {
    sink: EventSink,
    link: Link,
}

#[derive(Debug, Default)]
struct NetworkState {
    nodes: HashMap<MemberId, Node>,
    listeners: HashMap<SocketAddrV4, MemberId>,
    latency: HashMap<MemberId, Latency>,
}

impl NetworkState {
    fn deliver(&self, to: MemberId, event: TransportEvent) {
        if let Some(node) = self.nodes.get(&to) {
            // Receiver gone means the node was dropped; nothing to tell
            let _ = node.sink.send(event);
        }
    }

    fn set_link(&mut self, id: MemberId, link: Link) -> Link {
        match self.nodes.get_mut(&id) {
            Some(node) => std::mem::replace(&mut node.link, link),
            None => Link::Detached,
        }
    }

    fn link(&self, id: MemberId) -> Link {
        self.nodes
            .get(&id)
            .map_or(Link::Detached, |node| node.link.clone())
    }

    fn peers_mut(&mut self, host: MemberId) -> Option<&mut Vec<MemberId>> {
        match self.nodes.get_mut(&host).map(|node| &mut node.link) {
            Some(Link::Hosting { peers, .. }) => Some(peers),
            _ => None,
        }
    }

    /// Close a host's listener and notify all of its peers
    fn close_host(&mut self, host: MemberId, cause: LinkLoss) {
        if let Link::Hosting { bound, peers, .. } = self.set_link(host, Link::Detached) {
            self.listeners.remove(&bound);
            for peer in peers {
                self.set_link(peer, Link::Detached);
                self.deliver(peer, TransportEvent::LinkDown { cause });
            }
        }
    }
}

/// Shared broker for in-memory transports (also answers latency probes)
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a new node at `address`, delivering its events into `sink`
    pub fn transport(&self, address: Ipv4Addr, sink: EventSink) -> MemoryTransport {
        let id = MemberId::new();
        self.lock().nodes.insert(
            id,
            Node {
                sink,
                link: Link::Detached,
            },
        );

        MemoryTransport {
            id,
            address,
            network: self.clone(),
            public_address: false,
        }
    }

    /// Probes towards `id` take `latency` to complete
    pub fn set_latency(&self, id: MemberId, latency: Duration) {
        self.lock().latency.insert(id, Latency::Fixed(latency));
    }

    /// Probes towards `id` are lost and never complete
    pub fn drop_probes(&self, id: MemberId) {
        self.lock().latency.insert(id, Latency::Lost);
    }

    /// Simulate a broken link for `id` without any orderly close
    pub fn sever(&self, id: MemberId) {
        let mut state = self.lock();

        match state.link(id) {
            Link::Joined { host } => {
                state.set_link(id, Link::Detached);
                if let Some(peers) = state.peers_mut(host) {
                    peers.retain(|p| *p != id);
                }
                state.deliver(id, TransportEvent::LinkDown {
                    cause: LinkLoss::Lost,
                });
                state.deliver(host, TransportEvent::PeerDisconnected { id });
            }
            Link::Hosting { .. } => {
                state.close_host(id, LinkLoss::Lost);
                state.deliver(id, TransportEvent::LinkDown {
                    cause: LinkLoss::Lost,
                });
            }
            Link::Detached => {}
        }
    }

    /// Peers currently attached to a host
    pub fn peers_of(&self, host: MemberId) -> Vec<MemberId> {
        match self.lock().link(host) {
            Link::Hosting { peers, .. } => peers,
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl LatencyProbe for MemoryNetwork {
    async fn probe(&self, target: MemberId, _address: IpAddr) -> Option<Duration> {
        let latency = {
            let state = self.lock();
            if !state.nodes.contains_key(&target) {
                return None;
            }
            // Only hosts measure RTT, so a hosting target is the caller itself
            if matches!(state.link(target), Link::Hosting { .. }) {
                return Some(Duration::ZERO);
            }
            state
                .latency
                .get(&target)
                .copied()
                .unwrap_or(Latency::Fixed(DEFAULT_LATENCY))
        };

        match latency {
            Latency::Fixed(rtt) => {
                tokio::time::sleep(rtt).await;
                Some(rtt)
            }
            Latency::Lost => std::future::pending().await,
        }
    }
}

/// One node on a `MemoryNetwork`
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    id: MemberId,
    address: Ipv4Addr,
    network: MemoryNetwork,
    public_address: bool,
}

impl MemoryTransport {
    /// Identifier other nodes see us as
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn with_public_address(mut self, public_address: bool) -> Self {
        self.public_address = public_address;
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, config: ListenConfig) -> Result<LocalEndpoint> {
        let mut state = self.network.lock();
        let bound = SocketAddrV4::new(self.address, config.port);

        if state.listeners.contains_key(&bound) {
            return Err(TransportError::ListenFailed(format!(
                "{} is already in use",
                bound
            )));
        }

        if state.link(self.id) != Link::Detached {
            return Err(TransportError::ListenFailed(
                "already in a session".to_string(),
            ));
        }

        state.set_link(
            self.id,
            Link::Hosting {
                bound,
                peers: Vec::new(),
                max_connections: config.max_connections,
            },
        );
        state.listeners.insert(bound, self.id);

        tracing::debug!(%bound, nat_assist = config.nat_assist, "memory listener up");

        Ok(LocalEndpoint {
            id: self.id,
            address: IpAddr::V4(self.address),
            port: config.port,
        })
    }

    fn connect(&self, target: SocketAddrV4) -> Result<()> {
        let mut state = self.network.lock();

        if state.link(self.id) != Link::Detached {
            return Err(TransportError::ConnectFailed(
                "already in a session".to_string(),
            ));
        }

        let Some(host) = state.listeners.get(&target).copied() else {
            state.deliver(
                self.id,
                TransportEvent::ConnectFailed {
                    reason: format!("no session listening on {}", target),
                },
            );
            return Ok(());
        };

        let full = match state.link(host) {
            Link::Hosting {
                peers,
                max_connections,
                ..
            } => peers.len() >= max_connections,
            _ => true,
        };

        if full {
            state.deliver(
                self.id,
                TransportEvent::ConnectFailed {
                    reason: "session is full".to_string(),
                },
            );
            return Ok(());
        }

        if let Some(peers) = state.peers_mut(host) {
            peers.push(self.id);
        }
        state.set_link(self.id, Link::Joined { host });

        state.deliver(
            host,
            TransportEvent::PeerConnected {
                id: self.id,
                address: IpAddr::V4(self.address),
            },
        );
        state.deliver(
            self.id,
            TransportEvent::ConnectedToHost {
                local_id: self.id,
                host_id: host,
            },
        );

        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.network.lock();

        match state.link(self.id) {
            Link::Hosting { .. } => state.close_host(self.id, LinkLoss::Closed),
            Link::Joined { host } => {
                state.set_link(self.id, Link::Detached);
                if let Some(peers) = state.peers_mut(host) {
                    peers.retain(|p| *p != self.id);
                }
                state.deliver(host, TransportEvent::PeerDisconnected { id: self.id });
            }
            Link::Detached => {}
        }
    }

    fn kick(&self, peer: MemberId) {
        let mut state = self.network.lock();

        let removed = match state.peers_mut(self.id) {
            Some(peers) if peers.contains(&peer) => {
                peers.retain(|p| *p != peer);
                true
            }
            _ => false,
        };

        if removed {
            state.set_link(peer, Link::Detached);
            state.deliver(
                peer,
                TransportEvent::LinkDown {
                    cause: LinkLoss::Closed,
                },
            );
        }
    }

    fn send(&self, to: Recipients, data: Vec<u8>) -> Result<()> {
        let state = self.network.lock();

        let targets: Vec<MemberId> = match (state.link(self.id), to) {
            (Link::Detached, _) => return Err(TransportError::NotConnected),

            (Link::Hosting { peers, .. }, Recipients::Everyone) => peers,
            (Link::Hosting { peers, .. }, Recipients::Peer(id)) => {
                if !peers.contains(&id) {
                    return Err(TransportError::PeerNotFound(id.to_string()));
                }
                vec![id]
            }
            (Link::Hosting { .. }, Recipients::Host) => {
                return Err(TransportError::SendFailed(
                    "the host cannot send to itself".to_string(),
                ));
            }

            (Link::Joined { host }, Recipients::Host) => vec![host],
            (Link::Joined { host }, Recipients::Everyone) => {
                let mut targets = vec![host];
                if let Link::Hosting { peers, .. } = state.link(host) {
                    targets.extend(peers.into_iter().filter(|p| *p != self.id));
                }
                targets
            }
            (Link::Joined { host }, Recipients::Peer(id)) => {
                let reachable = id == host
                    || matches!(state.link(host), Link::Hosting { peers, .. } if peers.contains(&id));
                if !reachable {
                    return Err(TransportError::PeerNotFound(id.to_string()));
                }
                vec![id]
            }
        };

        for target in targets {
            state.deliver(
                target,
                TransportEvent::MessageReceived {
                    from: self.id,
                    data: data.clone(),
                },
            );
        }

        Ok(())
    }

    fn has_public_address(&self) -> bool {
        self.public_address
    }
}
