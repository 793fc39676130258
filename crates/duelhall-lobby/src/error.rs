//! Error types for the lobby.

use duelhall_protocol::{ErrorCode, ParticipantId, RequestId, RequestStatus, TableId, VenueId};
use duelhall_session::SessionError;
use duelhall_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The caller's session is invalid or not theirs.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("request {0} not found")]
    NotFound(RequestId),

    /// The acceptor is checked in at a different venue.
    #[error("request {request} is at venue {request_venue}, session is at {session_venue}")]
    WrongVenue {
        request: RequestId,
        request_venue: VenueId,
        session_venue: VenueId,
    },

    /// The acceptor sits at the table that created the request.
    #[error("request {request} cannot be accepted from its own table {table}")]
    SelfAccept { request: RequestId, table: TableId },

    /// The request is not in the status the operation needs. Race losers
    /// and lapsed requests end up here.
    #[error("request {request} is {actual}, expected {expected}")]
    InvalidState {
        request: RequestId,
        actual: RequestStatus,
        expected: RequestStatus,
    },

    #[error("{participant} has played {played} of {quota} matches today")]
    QuotaExceeded {
        participant: ParticipantId,
        played: u32,
        quota: u32,
    },

    /// An accepted request without an acceptor on record.
    #[error("request {0} has no acceptor")]
    MissingAcceptor(RequestId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LobbyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Session(e) => e.code(),
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::WrongVenue { .. } => ErrorCode::WrongVenue,
            Self::SelfAccept { .. } => ErrorCode::SelfAccept,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::MissingAcceptor(_) => ErrorCode::Internal,
            Self::Store(e) => e.code(),
        }
    }
}
