use crate::application::context::SessionContext;
use crate::infrastructure::message::{MessageKind, SessionMessage};
use lanlobby_core::{ChatEvent, MemberId, RosterListing, SessionEvent, SessionRole};
use std::collections::HashMap;

type Handler = fn(&mut SessionContext, MemberId, SessionMessage);

/// One entry of the dispatch table
#[derive(Clone, Copy)]
struct Route {
    allowed: fn(SessionRole) -> bool,
    handler: Handler,
}

/// Dispatch table from inbound message kind to handler
pub struct MessageRouter {
    routes: HashMap<MessageKind, Route>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        let mut routes = HashMap::new();

        routes.insert(
            MessageKind::AssignName,
            Route {
                allowed: |role| role.is_host(),
                handler: handle_assign_name,
            },
        );
        routes.insert(
            MessageKind::RosterUpdate,
            Route {
                allowed: |role| role == SessionRole::Connected,
                handler: handle_roster_update,
            },
        );
        routes.insert(
            MessageKind::ChatMessage,
            Route {
                allowed: |role| role.in_session(),
                handler: handle_chat,
            },
        );

        Self { routes }
    }

    /// Hand `message` to its handler; returns false when it was not routed
    pub fn route(&self, ctx: &mut SessionContext, from: MemberId, message: SessionMessage) -> bool {
        let kind = message.kind();

        let Some(route) = self.routes.get(&kind) else {
            tracing::warn!(?kind, "No route for message");
            return false;
        };

        if !(route.allowed)(ctx.role) {
            tracing::debug!(?kind, role = %ctx.role, %from, "Message not accepted in this role");
            return false;
        }

        (route.handler)(ctx, from, message);
        true
    }
}

fn handle_assign_name(ctx: &mut SessionContext, from: MemberId, message: SessionMessage) {
    let SessionMessage::AssignName { id, display_name } = message else {
        return;
    };

    if id != from {
        tracing::warn!(%from, claimed = %id, "Peer tried to name another member");
        return;
    }

    let display_name = display_name.trim().to_string();
    if display_name.is_empty() {
        tracing::warn!(%id, "Ignoring empty name assignment");
        return;
    }

    let Some(roster) = ctx.roster.as_mut() else {
        return;
    };

    match roster.assign_name(id, &display_name) {
        Ok(()) => {
            tracing::info!(%id, name = %display_name, "Member named");
            ctx.emit(SessionEvent::NameAssigned { id, display_name });
        }
        Err(e) => tracing::warn!(error = %e, "Name assignment failed"),
    }
}

fn handle_roster_update(ctx: &mut SessionContext, from: MemberId, message: SessionMessage) {
    let SessionMessage::RosterUpdate {
        listing_text,
        member_count,
    } = message
    else {
        return;
    };

    if ctx.host_id != Some(from) {
        tracing::warn!(%from, "Ignoring roster update from a non-host member");
        return;
    }

    ctx.mirror
        .apply(RosterListing::from_parts(listing_text, member_count));
    ctx.emit(SessionEvent::RosterUpdated { member_count });
}

fn handle_chat(ctx: &mut SessionContext, from: MemberId, message: SessionMessage) {
    let SessionMessage::ChatMessage {
        sender_display_name,
        text,
    } = message
    else {
        return;
    };

    ctx.emit(SessionEvent::ChatReceived(ChatEvent {
        sender_id: from,
        sender_display_name,
        text,
    }));
}
