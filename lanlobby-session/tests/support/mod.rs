#![allow(dead_code)]

pub mod recording_transport;

use lanlobby_core::{HostSettings, JoinRequest, MemberId, RosterListing, SessionEvent};
use lanlobby_session::{
    event_channel, MemoryNetwork, MemoryTransport, Result, SessionConfig, SessionController,
    Transport, TransportEvent,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const HOST_IP: &str = "10.0.0.1";
pub const PORT: &str = "25000";

pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("lanlobby_session=debug,lanlobby_core=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// One controller plus the queue its transport delivers into
pub struct Node<T: Transport = MemoryTransport> {
    pub controller: SessionController<T>,
    pub inbox: UnboundedReceiver<TransportEvent>,
    /// Session events collected while pumping
    pub events: Vec<SessionEvent>,
}

impl<T: Transport> Node<T> {
    pub fn new(controller: SessionController<T>, inbox: UnboundedReceiver<TransportEvent>) -> Self {
        Self {
            controller,
            inbox,
            events: Vec::new(),
        }
    }

    /// Feed every queued transport event to the controller
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.inbox.try_recv() {
            self.controller.handle_transport_event(event);
            processed += 1;
        }
        self.collect();
        processed
    }

    pub fn collect(&mut self) {
        let drained = self.controller.drain_events();
        self.events.extend(drained);
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.collect();
        std::mem::take(&mut self.events)
    }

    pub fn mirror_text(&self) -> Option<String> {
        self.controller
            .mirror()
            .current()
            .map(|listing| listing.text().to_string())
    }
}

impl Node<MemoryTransport> {
    pub fn id(&self) -> MemberId {
        self.controller.transport().id()
    }
}

/// Build a node at `10.0.0.<last_octet>` on `network`
pub fn memory_node(network: &MemoryNetwork, last_octet: u8) -> Node {
    let (sink, inbox) = event_channel();
    let transport = network.transport(Ipv4Addr::new(10, 0, 0, last_octet), sink);
    let controller =
        SessionController::new(transport, Arc::new(network.clone()), SessionConfig::default());
    Node::new(controller, inbox)
}

/// Test fixture: one host plus N idle guests on an in-memory network
///
/// Needs a tokio runtime (the host's scheduler and probes live on it). Ticks
/// are driven by hand through `tick_host`; the scheduler's own timer is not
/// consulted.
pub struct SessionFixture {
    pub network: MemoryNetwork,
    pub host: Node,
    pub guests: Vec<Node>,
}

impl SessionFixture {
    /// Host a session named "Test Server" and create `guest_count` guests
    pub async fn new(max_members: usize, guest_count: usize) -> Self {
        let network = MemoryNetwork::new();
        let mut host = memory_node(&network, 1);

        host.controller
            .create_session(HostSettings::new("Host", "Test Server").with_max_members(max_members))
            .await
            .expect("host should start");
        host.collect();

        let guests = (0..guest_count)
            .map(|i| memory_node(&network, 2 + i as u8))
            .collect();

        Self {
            network,
            host,
            guests,
        }
    }

    /// Issue a join request for guest `index`
    pub fn join(&mut self, index: usize, name: &str) -> Result<()> {
        self.guests[index]
            .controller
            .join_session(JoinRequest::new(name, HOST_IP, PORT))
    }

    /// Join every guest as Guest1..GuestN and let the handshakes settle
    pub fn join_all(&mut self) {
        for i in 0..self.guests.len() {
            self.join(i, &format!("Guest{}", i + 1))
                .expect("join request should be accepted");
        }
        self.pump_until_stable();
    }

    /// Pump host first, then guests, until no node has anything queued
    pub fn pump_until_stable(&mut self) -> usize {
        let mut rounds = 0;
        loop {
            let mut processed = self.host.pump();
            for guest in self.guests.iter_mut() {
                processed += guest.pump();
            }
            if processed == 0 {
                return rounds;
            }
            rounds += 1;
            tracing::trace!(round = rounds, processed, "pumped");
        }
    }

    /// Run one broadcast cycle on the host and deliver it everywhere
    pub fn tick_host(&mut self) -> RosterListing {
        let listing = self
            .host
            .controller
            .broadcast_tick()
            .expect("host should be broadcasting");
        self.pump_until_stable();
        listing
    }

    /// Let probe tasks run for `duration` of (paused) time
    pub async fn advance(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }

    pub fn assert_converged(&self, listing: &RosterListing) {
        assert_eq!(
            self.host.mirror_text().as_deref(),
            Some(listing.text()),
            "host mirror should hold the last listing"
        );

        for (i, guest) in self.guests.iter().enumerate() {
            if !guest.controller.role().in_session() {
                continue;
            }
            assert_eq!(
                guest.mirror_text().as_deref(),
                Some(listing.text()),
                "Guest{} mirror diverged",
                i + 1
            );
            assert_eq!(guest.controller.mirror().member_count(), listing.member_count());
        }
    }
}
