pub mod events;
pub mod listing;
pub mod member;
pub mod roster;
pub mod session;

pub use events::{ChatEvent, DisconnectReason, Notice, NoticeLevel, SessionEvent};
pub use listing::{RosterListing, RosterMirror};
pub use member::{Member, MemberId};
pub use roster::{Roster, RosterError};
pub use session::{
    HostConfig, HostSettings, JoinRequest, JoinTarget, NatAssist, SessionRole, ValidationError,
    DEFAULT_MAX_MEMBERS, DEFAULT_PORT, MAX_MEMBERS_LIMIT,
};
