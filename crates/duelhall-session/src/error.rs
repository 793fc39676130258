//! Error types for the session layer.

use duelhall_protocol::{ErrorCode, ParticipantId, SessionId};
use duelhall_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The handshake token was rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The admin credential did not match.
    #[error("admin credential rejected")]
    AdminRejected,

    /// No table carries this QR token.
    #[error("unknown QR token")]
    UnknownTable,

    /// The session does not exist or has ended.
    #[error("invalid session {0}")]
    InvalidSession(SessionId),

    /// The session belongs to someone else.
    #[error("session {session} does not belong to {participant}")]
    NotOwner {
        session: SessionId,
        participant: ParticipantId,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthFailed(_) | Self::AdminRejected | Self::NotOwner { .. } => {
                ErrorCode::Unauthorized
            }
            Self::UnknownTable | Self::InvalidSession(_) => ErrorCode::Validation,
            Self::Store(e) => e.code(),
        }
    }
}
