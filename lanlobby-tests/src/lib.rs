use cucumber::World;
use lanlobby_core::{HostSettings, JoinRequest, MemberId, RosterListing, SessionEvent};
use lanlobby_session::{
    event_channel, MemoryNetwork, MemoryTransport, SessionConfig, SessionController,
    SessionError, TransportEvent,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Address every scenario host listens on
pub const HOST_IP: &str = "10.0.0.1";

/// One session participant on the in-memory network
pub struct Peer {
    pub controller: SessionController<MemoryTransport>,
    inbox: UnboundedReceiver<TransportEvent>,
    /// Every session event seen so far
    pub events: Vec<SessionEvent>,
}

impl Peer {
    fn new(network: &MemoryNetwork, last_octet: u8) -> Self {
        let (sink, inbox) = event_channel();
        let transport = network.transport(Ipv4Addr::new(10, 0, 0, last_octet), sink);
        let controller =
            SessionController::new(transport, Arc::new(network.clone()), SessionConfig::default());

        Self {
            controller,
            inbox,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> MemberId {
        self.controller.transport().id()
    }

    /// Feed queued transport events to the controller
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

    pub fn mirror_text(&self) -> Option<String> {
        self.controller
            .mirror()
            .current()
            .map(|listing| listing.text().to_string())
    }

    /// Notices shown so far, in order
    pub fn notices(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(SessionEvent::notice)
            .map(|notice| notice.text)
            .collect()
    }

    pub fn chat_lines(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::ChatReceived(chat) => {
                    Some((chat.sender_display_name.clone(), chat.text.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[derive(World)]
#[world(init = Self::new)]
pub struct LobbyWorld {
    pub network: MemoryNetwork,

    /// The hosting peer, once a scenario created one
    pub host: Option<Peer>,

    /// Guests by label
    pub guests: HashMap<String, Peer>,

    /// Result of the last create/join/chat call
    pub last_result: Option<Result<(), SessionError>>,

    /// Listing produced by the last broadcast tick
    pub last_listing: Option<RosterListing>,

    next_octet: u8,
}

impl std::fmt::Debug for LobbyWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyWorld")
            .field("host", &self.host.as_ref().map(|h| h.controller.role()))
            .field("guests", &self.guests.keys().collect::<Vec<_>>())
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl LobbyWorld {
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            host: None,
            guests: HashMap::new(),
            last_result: None,
            last_listing: None,
            next_octet: 2,
        }
    }

    /// Start hosting at `HOST_IP` on the default port
    pub async fn start_host(&mut self, name: &str, server_name: &str, max_members: usize) {
        let mut host = Peer::new(&self.network, 1);
        let result = host
            .controller
            .create_session(HostSettings::new(name, server_name).with_max_members(max_members))
            .await;
        host.collect();

        self.last_result = Some(result);
        self.host = Some(host);
    }

    pub fn add_guest(&mut self, label: &str) {
        let guest = Peer::new(&self.network, self.next_octet);
        self.next_octet += 1;
        self.guests.insert(label.to_string(), guest);
    }

    pub fn host(&self) -> &Peer {
        self.host.as_ref().expect("no host in this scenario")
    }

    pub fn host_mut(&mut self) -> &mut Peer {
        self.host.as_mut().expect("no host in this scenario")
    }

    pub fn guest(&self, label: &str) -> &Peer {
        self.guests
            .get(label)
            .unwrap_or_else(|| panic!("Guest '{}' not found", label))
    }

    pub fn guest_mut(&mut self, label: &str) -> &mut Peer {
        self.guests
            .get_mut(label)
            .unwrap_or_else(|| panic!("Guest '{}' not found", label))
    }

    /// Issue a join request from `label`
    pub fn join(&mut self, label: &str, request: JoinRequest) {
        let guest = self.guest_mut(label);
        let result = guest.controller.join_session(request);
        guest.collect();
        self.last_result = Some(result);
    }

    /// Deliver queued events everywhere until nothing is left in flight
    pub fn settle(&mut self) {
        loop {
            let mut processed = self.host.as_mut().map_or(0, Peer::pump);
            for guest in self.guests.values_mut() {
                processed += guest.pump();
            }
            if processed == 0 {
                break;
            }
        }
    }

    /// Run one host broadcast cycle and deliver it
    pub fn broadcast(&mut self) {
        let listing = self.host_mut().controller.broadcast_tick();
        self.last_listing = listing;
        self.settle();
    }

    pub fn last_listing(&self) -> &RosterListing {
        self.last_listing
            .as_ref()
            .expect("the host has not broadcast yet")
    }
}
