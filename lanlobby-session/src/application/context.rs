use lanlobby_core::{MemberId, Roster, RosterMirror, SessionEvent, SessionRole};

/// Mutable session state shared by the controller, the router and the
/// broadcast cycle
#[derive(Debug, Default)]
pub struct SessionContext {
    pub role: SessionRole,
    pub local_id: Option<MemberId>,
    /// Who roster updates must come from; only known once connected
    pub host_id: Option<MemberId>,
    pub display_name: String,
    pub server_name: String,
    /// Authoritative roster; only present while hosting
    pub roster: Option<Roster>,
    pub mirror: RosterMirror,
    outbox: Vec<SessionEvent>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the caller
    pub fn emit(&mut self, event: SessionEvent) {
        self.outbox.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Back to idle; queued events are kept
    pub fn reset(&mut self) {
        self.role = SessionRole::Idle;
        self.local_id = None;
        self.host_id = None;
        self.display_name.clear();
        self.server_name.clear();
        self.roster = None;
        self.mirror.clear();
    }
}
