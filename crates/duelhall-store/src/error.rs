//! Error types for the storage layer.

use duelhall_protocol::{ErrorCode, MatchId, RequestId, RequestStatus, SessionId};

/// Errors a [`Store`](crate::Store) can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No request with this id.
    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    /// No match with this id.
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    /// No session with this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The caller asked for a status change the lifecycle forbids.
    #[error("illegal request transition {from} -> {to}")]
    IllegalTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// The backend failed (connection lost, write rejected, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RequestNotFound(_) | Self::MatchNotFound(_) | Self::SessionNotFound(_) => {
                ErrorCode::NotFound
            }
            Self::IllegalTransition { .. } => ErrorCode::InvalidState,
            Self::Unavailable(_) => ErrorCode::Internal,
        }
    }
}
