//! Unified error type for Duelhall.

use duelhall_lobby::LobbyError;
use duelhall_match::MatchError;
use duelhall_protocol::{ErrorCode, ProtocolError};
use duelhall_session::SessionError;
use duelhall_store::StoreError;
use tokio_tungstenite::tungstenite;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    /// Malformed frame or a frame that breaks the handshake rules.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Check-in, credential, or session ownership failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Request lifecycle failure.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Live match failure.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The connection's role may not perform this action.
    #[error("not permitted: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// WebSocket failure.
    #[error("transport: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl DuelError {
    /// The code reported to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Session(e) => e.code(),
            Self::Lobby(e) => e.code(),
            Self::Match(e) => e.code(),
            Self::Forbidden(_) => ErrorCode::Unauthorized,
            Self::Config(_) => ErrorCode::Validation,
            Self::Transport(_) | Self::Io(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use duelhall_protocol::{MatchId, ParticipantId, RequestId, RequestStatus};

    use super::*;

    #[test]
    fn test_from_lobby_error_keeps_code() {
        let err: DuelError = LobbyError::InvalidState {
            request: RequestId(3),
            actual: RequestStatus::Expired,
            expected: RequestStatus::Pending,
        }
        .into();
        assert!(matches!(err, DuelError::Lobby(_)));
        assert_eq!(err.code(), ErrorCode::InvalidState);
        assert!(err.to_string().contains("EXPIRED"));
    }

    #[test]
    fn test_from_match_error_keeps_code() {
        let err: DuelError = MatchError::NotParticipant {
            match_id: MatchId(1),
            participant: ParticipantId(9),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_from_session_error() {
        let err: DuelError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, DuelError::Session(_)));
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_from_store_error_is_internal_when_unavailable() {
        let err: DuelError = StoreError::Unavailable("disk".into()).into();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_protocol_error_is_validation() {
        let err: DuelError = ProtocolError::InvalidMessage("bad".into()).into();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn test_forbidden_is_unauthorized() {
        assert_eq!(
            DuelError::Forbidden("admin only").code(),
            ErrorCode::Unauthorized
        );
    }
}
