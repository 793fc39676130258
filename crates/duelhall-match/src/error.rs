//! Error types for live matches.

use duelhall_protocol::{ErrorCode, GameVariant, MatchId, ParticipantId};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// No live match with this id (never launched, or already settled).
    #[error("match {0} is not live")]
    NotFound(MatchId),

    #[error("{participant} does not play in match {match_id}")]
    NotParticipant {
        match_id: MatchId,
        participant: ParticipantId,
    },

    /// A command for the other game variant.
    #[error("match {match_id} is a {actual} match, not {requested}")]
    WrongVariant {
        match_id: MatchId,
        actual: GameVariant,
        requested: GameVariant,
    },

    #[error("match {0} is already live")]
    AlreadyLive(MatchId),

    #[error("match {0} is already settled")]
    AlreadySettled(MatchId),

    /// The quiz has no questions yet; someone has to send ready first.
    #[error("quiz has not started")]
    NotStarted,

    #[error("question index {index} out of range (quiz has {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The actor stopped while the command was in flight.
    #[error("match {0} stopped")]
    Unavailable(MatchId),
}

impl MatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotParticipant { .. } => ErrorCode::Unauthorized,
            Self::IndexOutOfRange { .. } => ErrorCode::Validation,
            Self::WrongVariant { .. }
            | Self::AlreadyLive(_)
            | Self::AlreadySettled(_)
            | Self::NotStarted
            | Self::Unavailable(_) => ErrorCode::InvalidState,
        }
    }
}
