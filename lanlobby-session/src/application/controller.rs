use crate::application::config::SessionConfig;
use crate::application::context::SessionContext;
use crate::application::dispatcher::{DispatchedEvent, EventDispatcher};
use crate::application::prober::LivenessProber;
use crate::application::router::MessageRouter;
use crate::application::scheduler::{run_cycle, BroadcastScheduler};
use crate::error::{Result, SessionError};
use crate::infrastructure::message::SessionMessage;
use crate::infrastructure::transport::{
    LatencyProbe, ListenConfig, Recipients, Transport, TransportEvent,
};
use lanlobby_core::{
    ChatEvent, DisconnectReason, HostSettings, JoinRequest, Member, MemberId, Roster, RosterError,
    RosterListing, RosterMirror, SessionEvent, SessionRole, ValidationError,
};
use std::net::IpAddr;
use std::sync::Arc;

/// Point-in-time view for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub role: SessionRole,
    pub local_id: Option<MemberId>,
    pub display_name: String,
    pub server_name: String,
    /// Authoritative members (host only)
    pub roster: Vec<Member>,
    /// Last listing applied to the local mirror
    pub mirror: Option<RosterListing>,
}

impl SessionSnapshot {
    pub fn member_count(&self) -> usize {
        self.mirror.as_ref().map_or(0, |l| l.member_count())
    }
}

/// Session lifecycle state machine
///
/// Owns the session context and every collaborator that touches it. All
/// inputs (user operations, transport events, scheduler ticks) must be fed in
/// from one sequence; `SessionRuntime` does that for async callers.
///
/// Failures are reported twice: as the returned `Err` and as a
/// `SessionEvent` in the outbox, so event-only consumers see them too.
pub struct SessionController<T: Transport> {
    transport: T,
    ctx: SessionContext,
    dispatcher: EventDispatcher,
    router: MessageRouter,
    prober: LivenessProber,
    scheduler: Option<BroadcastScheduler>,
    config: SessionConfig,
}

impl<T: Transport> std::fmt::Debug for SessionController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("ctx", &self.ctx)
            .field("prober", &self.prober)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, probe: Arc<dyn LatencyProbe>, config: SessionConfig) -> Self {
        Self {
            transport,
            ctx: SessionContext::new(),
            dispatcher: EventDispatcher::new(),
            router: MessageRouter::new(),
            prober: LivenessProber::new(probe),
            scheduler: None,
            config,
        }
    }

    // ===== Operations =====

    /// Validate settings and start hosting
    ///
    /// Resolves once the transport confirms the listener. On listen failure
    /// the controller stays idle.
    pub async fn create_session(&mut self, settings: HostSettings) -> Result<()> {
        self.ensure_idle("host a session")?;
        let config = self.validated(settings.validate())?;

        let nat_assist = config
            .nat_assist
            .resolve(self.transport.has_public_address());

        let listen = ListenConfig {
            port: config.port,
            max_connections: config.max_members.saturating_sub(1),
            nat_assist,
        };

        let endpoint = match self.transport.listen(listen).await {
            Ok(endpoint) => endpoint,
            Err(e) => return Err(self.connection_failed(e.to_string())),
        };

        self.ctx.role = SessionRole::Hosting;
        self.ctx.local_id = Some(endpoint.id);
        self.ctx.display_name = config.display_name.clone();
        self.ctx.server_name = config.server_name.clone();

        let mut roster = Roster::new(config.max_members);
        let admitted = roster.admit(endpoint.id, endpoint.address).map(|_| ());
        let self_entry =
            admitted.and_then(|()| roster.assign_name(endpoint.id, &config.display_name));
        if let Err(e) = self_entry {
            tracing::warn!(error = %e, "Host could not list itself");
        }
        self.ctx.roster = Some(roster);

        let scheduler = BroadcastScheduler::start(self.config.broadcast_interval);
        self.prober.attach(scheduler.token());
        self.scheduler = Some(scheduler);

        tracing::info!(
            server = %config.server_name,
            port = endpoint.port,
            max_members = config.max_members,
            nat_assist,
            "🏠 Session created"
        );

        self.ctx.emit(SessionEvent::SessionCreated {
            server_name: config.server_name,
            port: endpoint.port,
            nat_assist,
        });

        Ok(())
    }

    /// Validate the join input and request a connection
    ///
    /// Completion arrives later as a transport event.
    pub fn join_session(&mut self, request: JoinRequest) -> Result<()> {
        self.ensure_idle("join a session")?;
        let target = self.validated(request.validate())?;

        if let Err(e) = self.transport.connect(target.address) {
            return Err(self.connection_failed(e.to_string()));
        }

        self.ctx.role = SessionRole::Connecting;
        self.ctx.display_name = target.display_name;

        tracing::info!(address = %target.address, "Joining session");
        self.ctx.emit(SessionEvent::JoinStarted {
            address: target.address,
        });

        Ok(())
    }

    /// Leave whatever session we are in; idempotent
    pub fn leave_session(&mut self) {
        let reason = match self.ctx.role {
            SessionRole::Idle => return,
            SessionRole::Hosting => DisconnectReason::HostClosed,
            SessionRole::Connecting | SessionRole::Connected => DisconnectReason::VoluntaryLeave,
        };

        self.transport.disconnect();
        self.teardown();

        tracing::info!(%reason, "Left session");
        self.ctx.emit(SessionEvent::Disconnected { reason });
    }

    /// Broadcast a chat line; it is also echoed locally
    pub fn send_chat(&mut self, text: &str) -> Result<()> {
        let local_id = match self.ctx.local_id {
            Some(id) if self.ctx.role.in_session() => id,
            _ => return Err(SessionError::NotInSession),
        };

        if text.trim().is_empty() {
            return Err(self.invalid(ValidationError::EmptyChatText));
        }

        let message = SessionMessage::ChatMessage {
            sender_display_name: self.ctx.display_name.clone(),
            text: text.to_string(),
        };
        self.transport.send(Recipients::Everyone, message.encode()?)?;

        self.ctx.emit(SessionEvent::ChatReceived(ChatEvent {
            sender_id: local_id,
            sender_display_name: self.ctx.display_name.clone(),
            text: text.to_string(),
        }));

        Ok(())
    }

    // ===== Inputs from the session sequence =====

    /// Feed one raw transport callback through the dispatcher
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let Some(event) = self.dispatcher.translate(self.ctx.role, event) else {
            return;
        };

        match event {
            DispatchedEvent::PeerJoined { id, address } => self.on_peer_joined(id, address),
            DispatchedEvent::PeerLeft { id } => self.on_peer_left(id),
            DispatchedEvent::Connected { local_id, host_id } => {
                self.on_connected(local_id, host_id)
            }
            DispatchedEvent::ConnectFailed { reason } => {
                tracing::warn!(%reason, "Connect failed");
                self.ctx.reset();
                self.ctx.emit(SessionEvent::ConnectionError { reason });
            }
            DispatchedEvent::Disconnected { reason } => {
                tracing::info!(%reason, "Session link down");
                self.teardown();
                self.ctx.emit(SessionEvent::Disconnected { reason });
            }
            DispatchedEvent::Message { from, message } => {
                self.router.route(&mut self.ctx, from, message);
            }
        }
    }

    /// Run one broadcast cycle now (host only)
    pub fn broadcast_tick(&mut self) -> Option<RosterListing> {
        if !self.ctx.role.is_host() {
            return None;
        }
        run_cycle(&mut self.ctx, &mut self.prober, &self.transport)
    }

    /// Resolves on the next scheduler tick; never resolves when not hosting
    pub async fn next_tick(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            if scheduler.tick().await {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.ctx.drain_events()
    }

    // ===== Queries =====

    pub fn role(&self) -> SessionRole {
        self.ctx.role
    }

    pub fn local_id(&self) -> Option<MemberId> {
        self.ctx.local_id
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.ctx.roster.as_ref()
    }

    pub fn mirror(&self) -> &RosterMirror {
        &self.ctx.mirror
    }

    pub fn prober(&self) -> &LivenessProber {
        &self.prober
    }

    pub fn is_broadcasting(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| !s.is_cancelled())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            role: self.ctx.role,
            local_id: self.ctx.local_id,
            display_name: self.ctx.display_name.clone(),
            server_name: self.ctx.server_name.clone(),
            roster: self
                .ctx
                .roster
                .as_ref()
                .map(|r| r.members().to_vec())
                .unwrap_or_default(),
            mirror: self.ctx.mirror.current().map(|l| l.as_ref().clone()),
        }
    }

    // ===== Internals =====

    fn on_peer_joined(&mut self, id: MemberId, address: IpAddr) {
        let Some(roster) = self.ctx.roster.as_mut() else {
            return;
        };

        match roster.admit(id, address).map(|_| ()) {
            Ok(()) => {
                tracing::info!(member = %id, %address, "👋 Member joined");
                self.ctx.emit(SessionEvent::MemberJoined { id, address });
            }
            Err(RosterError::Full { max }) => {
                tracing::warn!(member = %id, max, "Roster full, dropping peer");
                self.transport.kick(id);
                self.ctx.emit(SessionEvent::MemberRejected {
                    id,
                    max_members: max,
                });
            }
            Err(e) => tracing::warn!(error = %e, "Could not admit peer"),
        }
    }

    fn on_peer_left(&mut self, id: MemberId) {
        self.prober.forget(id);

        let removed = self
            .ctx
            .roster
            .as_mut()
            .and_then(|roster| roster.remove(id));

        if removed.is_some() {
            tracing::info!(member = %id, "Member left");
            self.ctx.emit(SessionEvent::MemberLeft { id });
        }
    }

    fn on_connected(&mut self, local_id: MemberId, host_id: MemberId) {
        self.ctx.role = SessionRole::Connected;
        self.ctx.local_id = Some(local_id);
        self.ctx.host_id = Some(host_id);

        let handshake = SessionMessage::AssignName {
            id: local_id,
            display_name: self.ctx.display_name.clone(),
        };
        let sent = handshake
            .encode()
            .and_then(|data| self.transport.send(Recipients::Host, data));
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Name handshake failed");
        }

        tracing::info!(%local_id, "✅ Connected to host");
        self.ctx.emit(SessionEvent::Connected { local_id });
    }

    /// Stop the timer, drop probes and clear all session state
    fn teardown(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.cancel();
        }
        self.prober.cancel_all();
        self.ctx.reset();
    }

    fn ensure_idle(&mut self, attempted: &'static str) -> Result<()> {
        let current = self.ctx.role;
        if current.is_idle() {
            return Ok(());
        }

        tracing::warn!(attempted, %current, "Role conflict");
        self.ctx
            .emit(SessionEvent::RoleConflict { attempted, current });
        Err(SessionError::RoleConflict { attempted, current })
    }

    fn validated<V>(&mut self, result: std::result::Result<V, ValidationError>) -> Result<V> {
        result.map_err(|e| self.invalid(e))
    }

    fn invalid(&mut self, error: ValidationError) -> SessionError {
        tracing::debug!(error = %error, "Rejected input");
        self.ctx.emit(SessionEvent::ValidationFailed(error.clone()));
        SessionError::Validation(error)
    }

    fn connection_failed(&mut self, reason: String) -> SessionError {
        tracing::warn!(%reason, "Connection error");
        self.ctx.reset();
        self.ctx.emit(SessionEvent::ConnectionError {
            reason: reason.clone(),
        });
        SessionError::Connection(reason)
    }
}
