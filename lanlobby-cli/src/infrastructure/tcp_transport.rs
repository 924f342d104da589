//! TCP transport
//!
//! Newline-delimited JSON frames over plain TCP streams. The host accepts up
//! to `max_connections` peers and relays client broadcasts; latency probes
//! are ping/pong frames on the peer's own stream.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lanlobby_core::MemberId;
use lanlobby_session::infrastructure::error::{Result, TransportError};
use lanlobby_session::{
    EventSink, LatencyProbe, LinkLoss, ListenConfig, LocalEndpoint, Recipients, Transport,
    TransportEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

const MAX_FRAME_LENGTH: usize = 256 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a data frame is headed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
enum Route {
    Host,
    Peer(MemberId),
    Everyone,
}

impl From<Recipients> for Route {
    fn from(to: Recipients) -> Self {
        match to {
            Recipients::Host => Route::Host,
            Recipients::Peer(id) => Route::Peer(id),
            Recipients::Everyone => Route::Everyone,
        }
    }
}

/// One line on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
enum Frame {
    /// Host → new peer: accepted, here are the ids
    Welcome { host_id: MemberId, your_id: MemberId },
    /// Host → new peer: no room
    Full,
    Data {
        origin: MemberId,
        to: Route,
        payload: Vec<u8>,
    },
    Ping { nonce: u64 },
    Pong { nonce: u64 },
    /// Orderly shutdown of the link
    Close,
}

type FrameTx = mpsc::UnboundedSender<Frame>;
type FrameReader = FramedRead<OwnedReadHalf, LinesCodec>;

fn codec() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_FRAME_LENGTH)
}

/// Drain queued frames into the socket; closes the write half once every
/// sender is gone
fn spawn_writer(write_half: OwnedWriteHalf) -> FrameTx {
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    tokio::spawn(async move {
        let mut writer = FramedWrite::new(write_half, codec());
        while let Some(frame) = rx.recv().await {
            let line = match serde_json::to_string(&frame) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not encode frame");
                    continue;
                }
            };
            if let Err(e) = writer.send(line).await {
                tracing::debug!(error = %e, "Write failed, dropping link");
                break;
            }
        }
    });

    tx
}

/// Next well-formed frame; `None` on EOF, read error or cancellation
async fn next_frame(reader: &mut FrameReader, token: &CancellationToken) -> Option<Frame> {
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => return None,
            line = reader.next() => line,
        };

        match line? {
            Ok(line) => match serde_json::from_str::<Frame>(&line) {
                Ok(frame) => return Some(frame),
                Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Read failed");
                return None;
            }
        }
    }
}

struct PeerLink {
    address: IpAddr,
    tx: FrameTx,
    token: CancellationToken,
}

struct HostState {
    local_id: MemberId,
    peers: HashMap<MemberId, PeerLink>,
    max_connections: usize,
    token: CancellationToken,
}

struct ClientIds {
    local_id: MemberId,
    host_id: MemberId,
}

struct ClientState {
    /// Set once the TCP connection is up
    tx: Option<FrameTx>,
    /// Set once the host welcomed us
    ids: Option<ClientIds>,
    token: CancellationToken,
}

#[derive(Default)]
enum Mode {
    #[default]
    Idle,
    Hosting(HostState),
    Joining(ClientState),
}

#[derive(Default)]
struct Shared {
    mode: Mode,
    pings: HashMap<u64, oneshot::Sender<()>>,
    next_nonce: u64,
}

/// Removes an unanswered ping when the probe is dropped
struct PingGuard {
    shared: Arc<Mutex<Shared>>,
    nonce: u64,
}

impl Drop for PingGuard {
    fn drop(&mut self) {
        lock(&self.shared).pings.remove(&self.nonce);
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Session transport over TCP
///
/// Cloning is cheap; clones share the same connection state.
#[derive(Clone)]
pub struct TcpTransport {
    shared: Arc<Mutex<Shared>>,
    sink: EventSink,
    advertised_address: IpAddr,
    public_address: bool,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("advertised_address", &self.advertised_address)
            .field("public_address", &self.public_address)
            .finish()
    }
}

impl TcpTransport {
    pub fn new(sink: EventSink) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            sink,
            advertised_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            public_address: false,
        }
    }

    /// Address the host lists for itself
    pub fn with_advertised_address(mut self, address: IpAddr) -> Self {
        self.advertised_address = address;
        self
    }

    /// Whether this machine is reachable without NAT assistance
    pub fn with_public_address(mut self, public_address: bool) -> Self {
        self.public_address = public_address;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    fn emit(&self, event: TransportEvent) {
        if self.sink.send(event).is_err() {
            tracing::debug!("Event sink closed");
        }
    }

    // ===== Host side =====

    async fn accept_loop(self, listener: TcpListener, host_id: MemberId, token: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = token.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, remote)) => self.admit(stream, remote, host_id),
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            }
        }

        tracing::debug!("Accept loop stopped");
    }

    fn admit(&self, stream: TcpStream, remote: SocketAddr, host_id: MemberId) {
        let (read_half, write_half) = stream.into_split();
        let tx = spawn_writer(write_half);
        let id = MemberId::new();

        let token = {
            let mut shared = self.lock();
            let Mode::Hosting(host) = &mut shared.mode else {
                return;
            };

            if host.peers.len() >= host.max_connections {
                tracing::info!(%remote, "Refusing connection: session full");
                let _ = tx.send(Frame::Full);
                return;
            }

            let token = host.token.child_token();
            host.peers.insert(
                id,
                PeerLink {
                    address: remote.ip(),
                    tx: tx.clone(),
                    token: token.clone(),
                },
            );
            token
        };

        let _ = tx.send(Frame::Welcome {
            host_id,
            your_id: id,
        });
        self.emit(TransportEvent::PeerConnected {
            id,
            address: remote.ip(),
        });

        tokio::spawn(self.clone().serve_peer(id, read_half, token));
    }

    async fn serve_peer(self, id: MemberId, read_half: OwnedReadHalf, token: CancellationToken) {
        let mut reader = FramedRead::new(read_half, codec());

        while let Some(frame) = next_frame(&mut reader, &token).await {
            match frame {
                Frame::Data { to, payload, .. } => self.relay_from_peer(id, to, payload),
                Frame::Ping { nonce } => self.send_to_peer(id, Frame::Pong { nonce }),
                Frame::Pong { nonce } => self.resolve_ping(nonce),
                Frame::Close => break,
                other => tracing::debug!(member = %id, ?other, "Unexpected frame from peer"),
            }
        }

        if token.is_cancelled() {
            // Kicked or the host stopped; nothing to report
            return;
        }

        let removed = match &mut self.lock().mode {
            Mode::Hosting(host) => host.peers.remove(&id).is_some(),
            _ => false,
        };

        if removed {
            self.emit(TransportEvent::PeerDisconnected { id });
        }
    }

    /// Deliver a peer's data frame locally and/or forward it
    fn relay_from_peer(&self, from: MemberId, to: Route, payload: Vec<u8>) {
        let local = {
            let shared = self.lock();
            let Mode::Hosting(host) = &shared.mode else {
                return;
            };

            let forward = |link: &PeerLink| {
                let _ = link.tx.send(Frame::Data {
                    origin: from,
                    to,
                    payload: payload.clone(),
                });
            };

            match to {
                Route::Host => true,
                Route::Everyone => {
                    host.peers
                        .iter()
                        .filter(|(id, _)| **id != from)
                        .for_each(|(_, link)| forward(link));
                    true
                }
                Route::Peer(target) if target == host.local_id => true,
                Route::Peer(target) => {
                    match host.peers.get(&target) {
                        Some(link) => forward(link),
                        None => tracing::debug!(%target, "Relay target gone"),
                    }
                    false
                }
            }
        };

        if local {
            self.emit(TransportEvent::MessageReceived {
                from,
                data: payload,
            });
        }
    }

    fn send_to_peer(&self, id: MemberId, frame: Frame) {
        if let Mode::Hosting(host) = &self.lock().mode {
            if let Some(link) = host.peers.get(&id) {
                let _ = link.tx.send(frame);
            }
        }
    }

    // ===== Client side =====

    async fn run_client(self, target: SocketAddrV4, token: CancellationToken) {
        let connecting = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target));

        let stream = tokio::select! {
            _ = token.cancelled() => return,
            result = connecting => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return self.fail_connect(&token, e.to_string()),
                Err(_) => {
                    let reason = format!("no answer within {}s", CONNECT_TIMEOUT.as_secs());
                    return self.fail_connect(&token, reason);
                }
            },
        };

        let (read_half, write_half) = stream.into_split();
        let tx = spawn_writer(write_half);

        let attached = match &mut self.lock().mode {
            Mode::Joining(client) if !token.is_cancelled() => {
                client.tx = Some(tx);
                true
            }
            _ => false,
        };
        if !attached {
            return;
        }

        let mut reader = FramedRead::new(read_half, codec());
        let mut welcomed = false;
        let mut cause = LinkLoss::Lost;

        while let Some(frame) = next_frame(&mut reader, &token).await {
            match frame {
                Frame::Welcome { host_id, your_id } => {
                    if let Mode::Joining(client) = &mut self.lock().mode {
                        client.ids = Some(ClientIds {
                            local_id: your_id,
                            host_id,
                        });
                    }
                    welcomed = true;
                    tracing::debug!(%host_id, local_id = %your_id, "Welcomed by host");
                    self.emit(TransportEvent::ConnectedToHost {
                        local_id: your_id,
                        host_id,
                    });
                }
                Frame::Full => {
                    return self.fail_connect(&token, "session is full".to_string());
                }
                Frame::Data {
                    origin, payload, ..
                } => self.emit(TransportEvent::MessageReceived {
                    from: origin,
                    data: payload,
                }),
                Frame::Ping { nonce } => self.send_to_host(Frame::Pong { nonce }),
                Frame::Pong { nonce } => self.resolve_ping(nonce),
                Frame::Close => {
                    cause = LinkLoss::Closed;
                    break;
                }
            }
        }

        if token.is_cancelled() {
            // We disconnected ourselves
            return;
        }

        self.lock().mode = Mode::Idle;
        token.cancel();

        if welcomed {
            self.emit(TransportEvent::LinkDown { cause });
        } else {
            self.emit(TransportEvent::ConnectFailed {
                reason: "connection closed by host".to_string(),
            });
        }
    }

    fn fail_connect(&self, token: &CancellationToken, reason: String) {
        if token.is_cancelled() {
            return;
        }
        self.lock().mode = Mode::Idle;
        token.cancel();
        self.emit(TransportEvent::ConnectFailed { reason });
    }

    fn send_to_host(&self, frame: Frame) {
        if let Mode::Joining(ClientState { tx: Some(tx), .. }) = &self.lock().mode {
            let _ = tx.send(frame);
        }
    }

    // ===== Probes =====

    fn resolve_ping(&self, nonce: u64) {
        if let Some(done) = self.lock().pings.remove(&nonce) {
            let _ = done.send(());
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen(&self, config: ListenConfig) -> Result<LocalEndpoint> {
        let idle = matches!(self.lock().mode, Mode::Idle);
        if !idle {
            return Err(TransportError::ListenFailed(
                "already in a session".to_string(),
            ));
        }

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| TransportError::ListenFailed(format!("{}: {}", bind_addr, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| TransportError::ListenFailed(e.to_string()))?
            .port();

        let local_id = MemberId::new();
        let token = CancellationToken::new();
        self.lock().mode = Mode::Hosting(HostState {
            local_id,
            peers: HashMap::new(),
            max_connections: config.max_connections,
            token: token.clone(),
        });

        if config.nat_assist {
            tracing::info!("NAT assistance requested; plain TCP relies on port forwarding");
        }
        tracing::info!(port, max_connections = config.max_connections, "📡 Listening");

        tokio::spawn(self.clone().accept_loop(listener, local_id, token));

        Ok(LocalEndpoint {
            id: local_id,
            address: self.advertised_address,
            port,
        })
    }

    fn connect(&self, target: SocketAddrV4) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let token = CancellationToken::new();
        {
            let mut shared = self.lock();
            if !matches!(shared.mode, Mode::Idle) {
                return Err(TransportError::ConnectFailed(
                    "already in a session".to_string(),
                ));
            }
            shared.mode = Mode::Joining(ClientState {
                tx: None,
                ids: None,
                token: token.clone(),
            });
        }

        runtime.spawn(self.clone().run_client(target, token));
        Ok(())
    }

    fn disconnect(&self) {
        let previous = std::mem::take(&mut self.lock().mode);

        match previous {
            Mode::Idle => {}
            Mode::Hosting(host) => {
                for link in host.peers.into_values() {
                    let _ = link.tx.send(Frame::Close);
                    link.token.cancel();
                }
                host.token.cancel();
                tracing::info!("Stopped hosting");
            }
            Mode::Joining(client) => {
                if let Some(tx) = client.tx {
                    let _ = tx.send(Frame::Close);
                }
                client.token.cancel();
                tracing::debug!("Left host");
            }
        }
    }

    fn kick(&self, peer: MemberId) {
        let link = match &mut self.lock().mode {
            Mode::Hosting(host) => host.peers.remove(&peer),
            _ => None,
        };

        if let Some(link) = link {
            tracing::info!(member = %peer, address = %link.address, "Kicking peer");
            let _ = link.tx.send(Frame::Close);
            link.token.cancel();
        }
    }

    fn send(&self, to: Recipients, data: Vec<u8>) -> Result<()> {
        let shared = self.lock();

        match (&shared.mode, to) {
            (Mode::Idle, _) => Err(TransportError::NotConnected),

            (Mode::Hosting(host), Recipients::Everyone) => {
                for link in host.peers.values() {
                    let _ = link.tx.send(Frame::Data {
                        origin: host.local_id,
                        to: Route::Everyone,
                        payload: data.clone(),
                    });
                }
                Ok(())
            }
            (Mode::Hosting(host), Recipients::Peer(id)) => {
                let link = host
                    .peers
                    .get(&id)
                    .ok_or_else(|| TransportError::PeerNotFound(id.to_string()))?;
                link.tx
                    .send(Frame::Data {
                        origin: host.local_id,
                        to: Route::Peer(id),
                        payload: data,
                    })
                    .map_err(|_| TransportError::SendFailed("peer link closed".to_string()))
            }
            (Mode::Hosting(_), Recipients::Host) => Err(TransportError::SendFailed(
                "the host cannot send to itself".to_string(),
            )),

            (Mode::Joining(client), to) => {
                let (Some(tx), Some(ids)) = (&client.tx, &client.ids) else {
                    return Err(TransportError::NotConnected);
                };
                tx.send(Frame::Data {
                    origin: ids.local_id,
                    to: to.into(),
                    payload: data,
                })
                .map_err(|_| TransportError::SendFailed("host link closed".to_string()))
            }
        }
    }

    fn has_public_address(&self) -> bool {
        self.public_address
    }
}

#[async_trait]
impl LatencyProbe for TcpTransport {
    async fn probe(&self, target: MemberId, _address: IpAddr) -> Option<Duration> {
        let (nonce, started, answered) = {
            let mut shared = self.lock();

            let tx = match &shared.mode {
                Mode::Hosting(host) if host.local_id == target => return Some(Duration::ZERO),
                Mode::Hosting(host) => host.peers.get(&target)?.tx.clone(),
                Mode::Joining(ClientState {
                    tx: Some(tx),
                    ids: Some(ids),
                    ..
                }) if ids.host_id == target => tx.clone(),
                _ => return None,
            };

            shared.next_nonce += 1;
            let nonce = shared.next_nonce;
            let (done, answered) = oneshot::channel();
            shared.pings.insert(nonce, done);

            let started = Instant::now();
            if tx.send(Frame::Ping { nonce }).is_err() {
                shared.pings.remove(&nonce);
                return None;
            }
            (nonce, started, answered)
        };

        let _cleanup = PingGuard {
            shared: Arc::clone(&self.shared),
            nonce,
        };

        answered.await.ok()?;
        Some(started.elapsed())
    }
}
