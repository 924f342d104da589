use crate::infrastructure::error::TransportError;
use lanlobby_core::{SessionRole, ValidationError};

/// Errors returned by session operations
///
/// Every failure is also reported as a `SessionEvent`, so callers that only
/// watch the event stream see the same outcome.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cannot {attempted} while {current}")]
    RoleConflict {
        attempted: &'static str,
        current: SessionRole,
    },

    #[error("Not in a session")]
    NotInSession,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session runtime has shut down")]
    RuntimeClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
