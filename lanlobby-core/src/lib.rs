pub mod domain;

pub use domain::{
    ChatEvent, DisconnectReason, HostConfig, HostSettings, JoinRequest, JoinTarget, Member,
    MemberId, NatAssist, Notice, NoticeLevel, Roster, RosterError, RosterListing, RosterMirror,
    SessionEvent, SessionRole, ValidationError, DEFAULT_MAX_MEMBERS, DEFAULT_PORT,
    MAX_MEMBERS_LIMIT,
};
