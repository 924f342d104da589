use crate::domain::{MemberId, SessionRole, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddrV4};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The hosting side shut the session down
    HostClosed,
    /// The link dropped without a shutdown
    ConnectionLost,
    /// The local user left
    VoluntaryLeave,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::HostClosed => write!(f, "host closed the session"),
            DisconnectReason::ConnectionLost => write!(f, "connection lost"),
            DisconnectReason::VoluntaryLeave => write!(f, "left the session"),
        }
    }
}

/// A chat line as delivered to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub sender_id: MemberId,
    pub sender_display_name: String,
    pub text: String,
}

/// Everything the session core reports to its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport confirmed the listener; we are hosting
    SessionCreated {
        server_name: String,
        port: u16,
        nat_assist: bool,
    },

    /// Connect request issued
    JoinStarted { address: SocketAddrV4 },

    /// Joined a host
    Connected { local_id: MemberId },

    /// Listen or connect failed; back to idle
    ConnectionError { reason: String },

    /// Session torn down
    Disconnected { reason: DisconnectReason },

    /// Input rejected before any transport call
    ValidationFailed(ValidationError),

    /// Create/join attempted while not idle
    RoleConflict {
        attempted: &'static str,
        current: SessionRole,
    },

    /// Host admitted a peer
    MemberJoined { id: MemberId, address: IpAddr },

    /// Host turned a peer away because the roster is full
    MemberRejected { id: MemberId, max_members: usize },

    /// Host removed a departed peer
    MemberLeft { id: MemberId },

    /// Name handshake completed for a member
    NameAssigned { id: MemberId, display_name: String },

    /// Local roster view replaced
    RosterUpdated { member_count: usize },

    /// Chat passed through to the presentation layer
    ChatReceived(ChatEvent),
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "INFO"),
            NoticeLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A line a presentation layer can show as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> : {}", self.level, self.text)
    }
}

impl SessionEvent {
    /// User-facing notification, if this event warrants one
    ///
    /// Chat and roster refreshes are rendered by their own views.
    pub fn notice(&self) -> Option<Notice> {
        let notice = match self {
            SessionEvent::SessionCreated { .. } => Notice::info("Server initialized!"),
            SessionEvent::JoinStarted { address } => {
                Notice::info(format!("Trying to join {}...", address))
            }
            SessionEvent::Connected { .. } => Notice::info("Server joined!"),
            SessionEvent::ConnectionError { reason } => {
                Notice::error(format!("Failed to connect to the server: {}", reason))
            }
            SessionEvent::Disconnected { reason } => match reason {
                DisconnectReason::HostClosed => Notice::info("Server connection closed."),
                DisconnectReason::ConnectionLost => Notice::error("Connection lost!"),
                DisconnectReason::VoluntaryLeave => Notice::info("Disconnected from the server."),
            },
            SessionEvent::ValidationFailed(err) => Notice::error(format!("{}!", err)),
            SessionEvent::RoleConflict { attempted, current } => {
                Notice::error(format!("Cannot {} while {}", attempted, current))
            }
            SessionEvent::MemberRejected { max_members, .. } => Notice::info(format!(
                "Refused a player: session is full ({} max)",
                max_members
            )),
            SessionEvent::MemberJoined { .. }
            | SessionEvent::MemberLeft { .. }
            | SessionEvent::NameAssigned { .. }
            | SessionEvent::RosterUpdated { .. }
            | SessionEvent::ChatReceived(_) => return None,
        };

        Some(notice)
    }
}
