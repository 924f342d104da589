use crate::infrastructure::message::SessionMessage;
use crate::infrastructure::transport::{LinkLoss, TransportEvent};
use lanlobby_core::{DisconnectReason, MemberId, SessionRole};
use std::net::IpAddr;

/// Transport event after role filtering, in session terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchedEvent {
    /// Host: a peer wants in
    PeerJoined { id: MemberId, address: IpAddr },
    /// Host: a peer went away
    PeerLeft { id: MemberId },
    /// Client: the host accepted us
    Connected {
        local_id: MemberId,
        host_id: MemberId,
    },
    /// The session link is gone
    Disconnected { reason: DisconnectReason },
    /// Client: the connect attempt failed
    ConnectFailed { reason: String },
    /// A decoded domain message
    Message {
        from: MemberId,
        message: SessionMessage,
    },
}

/// Turns raw transport callbacks into session events
///
/// Events that make no sense in the current role (a late peer callback after
/// teardown, a connect result while hosting) are dropped here so the
/// controller never sees them.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDispatcher;

impl EventDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(&self, role: SessionRole, event: TransportEvent) -> Option<DispatchedEvent> {
        match (role, event) {
            (SessionRole::Hosting, TransportEvent::PeerConnected { id, address }) => {
                Some(DispatchedEvent::PeerJoined { id, address })
            }
            (SessionRole::Hosting, TransportEvent::PeerDisconnected { id }) => {
                Some(DispatchedEvent::PeerLeft { id })
            }

            (SessionRole::Connecting, TransportEvent::ConnectedToHost { local_id, host_id }) => {
                Some(DispatchedEvent::Connected { local_id, host_id })
            }
            (SessionRole::Connecting, TransportEvent::ConnectFailed { reason }) => {
                Some(DispatchedEvent::ConnectFailed { reason })
            }

            (role, TransportEvent::LinkDown { cause }) if !role.is_idle() => {
                let reason = match cause {
                    LinkLoss::Closed => DisconnectReason::HostClosed,
                    LinkLoss::Lost => DisconnectReason::ConnectionLost,
                };
                Some(DispatchedEvent::Disconnected { reason })
            }

            (role, TransportEvent::MessageReceived { from, data }) if !role.is_idle() => {
                match SessionMessage::decode(&data) {
                    Ok(message) => Some(DispatchedEvent::Message { from, message }),
                    Err(e) => {
                        tracing::warn!(%from, error = %e, "Dropping undecodable message");
                        None
                    }
                }
            }

            (role, event) => {
                tracing::trace!(%role, ?event, "Ignoring transport event");
                None
            }
        }
    }
}
