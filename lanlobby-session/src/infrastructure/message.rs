use crate::infrastructure::error::Result;
use lanlobby_core::{MemberId, RosterListing};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Domain messages exchanged over the session channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data")]
pub enum SessionMessage {
    /// Name handshake (peer → host)
    #[serde(rename = "assign_name")]
    AssignName { id: MemberId, display_name: String },

    /// Full roster listing (host → all)
    #[serde(rename = "roster_update")]
    RosterUpdate {
        listing_text: String,
        member_count: usize,
    },

    /// Chat line (any → all)
    #[serde(rename = "chat")]
    ChatMessage {
        sender_display_name: String,
        text: String,
    },
}

/// Discriminant used as the routing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AssignName,
    RosterUpdate,
    ChatMessage,
}

impl SessionMessage {
    pub fn roster_update(listing: &RosterListing) -> Self {
        SessionMessage::RosterUpdate {
            listing_text: listing.text().to_string(),
            member_count: listing.member_count(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            SessionMessage::AssignName { .. } => MessageKind::AssignName,
            SessionMessage::RosterUpdate { .. } => MessageKind::RosterUpdate,
            SessionMessage::ChatMessage { .. } => MessageKind::ChatMessage,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
