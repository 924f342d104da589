use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Stable identifier of a peer, assigned by the transport when it connects
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct MemberId(pub Uuid);

impl MemberId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MemberId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A connected peer as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique within a roster
    id: MemberId,
    /// Empty until the name-assignment handshake completes
    display_name: String,
    /// Address the peer connected from
    address: IpAddr,
    /// Last measured round-trip time (0 until a probe completes)
    last_known_rtt_millis: u32,
}

impl Member {
    /// A freshly connected, still unnamed member
    pub fn new(id: MemberId, address: IpAddr) -> Self {
        Self {
            id,
            display_name: String::new(),
            address,
            last_known_rtt_millis: 0,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    // Getters

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn last_known_rtt_millis(&self) -> u32 {
        self.last_known_rtt_millis
    }

    /// Check if the name handshake has completed
    pub fn is_named(&self) -> bool {
        !self.display_name.is_empty()
    }

    pub(crate) fn set_display_name(&mut self, display_name: String) {
        self.display_name = display_name;
    }

    pub(crate) fn set_rtt_millis(&mut self, millis: u32) {
        self.last_known_rtt_millis = millis;
    }
}
