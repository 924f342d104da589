use async_trait::async_trait;
use lanlobby_core::MemberId;
use lanlobby_session::infrastructure::error::Result;
use lanlobby_session::{ListenConfig, LocalEndpoint, MemoryTransport, Recipients, Transport};
use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};

/// Transport call as seen by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Listen { port: u16, max_connections: usize },
    Connect(SocketAddrV4),
    Disconnect,
    Kick(MemberId),
    Send(Recipients),
}

/// Wraps a memory transport and records every call made on it
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    inner: MemoryTransport,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingTransport {
    pub fn new(inner: MemoryTransport) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn listen(&self, config: ListenConfig) -> Result<LocalEndpoint> {
        self.record(Call::Listen {
            port: config.port,
            max_connections: config.max_connections,
        });
        self.inner.listen(config).await
    }

    fn connect(&self, target: SocketAddrV4) -> Result<()> {
        self.record(Call::Connect(target));
        self.inner.connect(target)
    }

    fn disconnect(&self) {
        self.record(Call::Disconnect);
        self.inner.disconnect();
    }

    fn kick(&self, peer: MemberId) {
        self.record(Call::Kick(peer));
        self.inner.kick(peer);
    }

    fn send(&self, to: Recipients, data: Vec<u8>) -> Result<()> {
        self.record(Call::Send(to));
        self.inner.send(to, data)
    }

    fn has_public_address(&self) -> bool {
        self.inner.has_public_address()
    }
}
