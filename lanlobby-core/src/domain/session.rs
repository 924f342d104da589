use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Port used when the host leaves it unspecified
pub const DEFAULT_PORT: u16 = 25000;

/// Session capacity when the host does not choose one
pub const DEFAULT_MAX_MEMBERS: usize = 4;

/// Largest capacity a host may ask for
pub const MAX_MEMBERS_LIMIT: usize = 64;

/// The local process's participation in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionRole {
    #[default]
    Idle,
    /// Owns the authoritative roster
    Hosting,
    /// Connect requested, waiting for the transport
    Connecting,
    /// Joined a host, mirrors its roster
    Connected,
}

impl SessionRole {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionRole::Idle)
    }

    pub fn is_host(&self) -> bool {
        matches!(self, SessionRole::Hosting)
    }

    /// Hosting or connected to a host
    pub fn in_session(&self) -> bool {
        matches!(self, SessionRole::Hosting | SessionRole::Connected)
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Idle => write!(f, "idle"),
            SessionRole::Hosting => write!(f, "hosting"),
            SessionRole::Connecting => write!(f, "connecting"),
            SessionRole::Connected => write!(f, "connected"),
        }
    }
}

/// Malformed user input, caught before any transport call
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter a player name")]
    EmptyDisplayName,

    #[error("Enter a server name")]
    EmptyServerName,

    #[error("Enter a valid IP address (got {0:?})")]
    InvalidIpAddress(String),

    #[error("Enter a valid port (got {0:?})")]
    InvalidPort(String),

    #[error("A session holds between 1 and {max} members", max = MAX_MEMBERS_LIMIT)]
    InvalidMaxMembers,

    #[error("Chat message cannot be empty")]
    EmptyChatText,
}

/// Whether the transport should use NAT assistance when listening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NatAssist {
    /// Enabled exactly when no public address is available
    #[default]
    Auto,
    Enabled,
    Disabled,
}

impl NatAssist {
    pub fn resolve(&self, has_public_address: bool) -> bool {
        match self {
            NatAssist::Auto => !has_public_address,
            NatAssist::Enabled => true,
            NatAssist::Disabled => false,
        }
    }
}

/// Raw host-side input for creating a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub display_name: String,
    pub server_name: String,
    pub port: Option<u16>,
    pub max_members: usize,
    pub nat_assist: NatAssist,
}

impl HostSettings {
    pub fn new(display_name: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            server_name: server_name.into(),
            port: None,
            max_members: DEFAULT_MAX_MEMBERS,
            nat_assist: NatAssist::Auto,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.max_members = max_members;
        self
    }

    pub fn with_nat_assist(mut self, nat_assist: NatAssist) -> Self {
        self.nat_assist = nat_assist;
        self
    }

    /// Check names (display name first) and resolve the default port
    pub fn validate(&self) -> Result<HostConfig, ValidationError> {
        if is_blank(&self.display_name) {
            return Err(ValidationError::EmptyDisplayName);
        }

        if is_blank(&self.server_name) {
            return Err(ValidationError::EmptyServerName);
        }

        if !(1..=MAX_MEMBERS_LIMIT).contains(&self.max_members) {
            return Err(ValidationError::InvalidMaxMembers);
        }

        Ok(HostConfig {
            display_name: self.display_name.clone(),
            server_name: self.server_name.clone(),
            port: self.port.unwrap_or(DEFAULT_PORT),
            max_members: self.max_members,
            nat_assist: self.nat_assist,
        })
    }
}

/// Validated host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub display_name: String,
    pub server_name: String,
    pub port: u16,
    pub max_members: usize,
    pub nat_assist: NatAssist,
}

/// Raw client-side input for joining a session, as typed by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub display_name: String,
    pub ip: String,
    pub port: String,
}

impl JoinRequest {
    pub fn new(
        display_name: impl Into<String>,
        ip: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            ip: ip.into(),
            port: port.into(),
        }
    }

    /// Validate name, then each IP octet, then port; the first failure wins
    pub fn validate(&self) -> Result<JoinTarget, ValidationError> {
        if is_blank(&self.display_name) {
            return Err(ValidationError::EmptyDisplayName);
        }

        let ip = parse_ipv4(&self.ip)?;

        let port = self
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| ValidationError::InvalidPort(self.port.clone()))?;

        Ok(JoinTarget {
            display_name: self.display_name.clone(),
            address: SocketAddrV4::new(ip, port),
        })
    }
}

/// Validated join target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub display_name: String,
    pub address: SocketAddrV4,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Exactly four dot-separated decimal octets
fn parse_ipv4(raw: &str) -> Result<Ipv4Addr, ValidationError> {
    let invalid = || ValidationError::InvalidIpAddress(raw.to_string());

    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() != 4 {
        return Err(invalid());
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse::<u8>().map_err(|_| invalid())?;
    }

    Ok(Ipv4Addr::from(octets))
}
