//! Inbound actions: everything a client can ask the engine to do.
//!
//! One tagged enum instead of string-named socket events, so every
//! dispatcher has to handle every action (the compiler checks the match).

use serde::{Deserialize, Serialize};

use crate::{
    Channel, GameVariant, LeaderboardPeriod, MatchId, RequestId, SessionId,
    VenueId,
};

/// A client → server frame.
///
/// `id` is chosen by the client and echoed back on the matching
/// `Reply`/`Error` frame so it can correlate responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub id: u64,
    pub action: Action,
}

/// Everything a client can send.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON:
/// `{ "type": "ReflexTap", "match_id": 4 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    // -- Handshake (first frame only) --
    /// Participant handshake. `token` is resolved by the server's
    /// authenticator into a participant identity.
    Hello { version: u32, token: String },

    /// Admin handshake with the out-of-band admin credential.
    AdminHello { version: u32, key: String },

    // -- Plumbing --
    /// Keep-alive.
    Ping,

    /// Start receiving events published on `channel`.
    Subscribe { channel: Channel },

    /// Stop receiving events published on `channel`.
    Unsubscribe { channel: Channel },

    /// The static game catalog.
    ListGames,

    // -- Check-in --
    /// Check in at the table whose QR code carries `qr_token`.
    CheckIn { qr_token: String },

    /// End a check-in session.
    CheckOut { session_id: SessionId },

    // -- Request lifecycle --
    CreateRequest {
        session_id: SessionId,
        variant: GameVariant,
    },

    AcceptRequest {
        request_id: RequestId,
        session_id: SessionId,
    },

    /// Non-terminal requests of a venue with their countdowns.
    ListRequests { venue_id: VenueId },

    /// Admin: requests waiting for a decision.
    ListAwaitingAdmin,

    /// Admin: approve or deny an accepted request.
    Decide { request_id: RequestId, approve: bool },

    // -- Live play --
    ReflexReady { match_id: MatchId },

    ReflexTap { match_id: MatchId },

    QuizReady { match_id: MatchId },

    QuizAnswer {
        match_id: MatchId,
        index: usize,
        value: i64,
    },

    // -- Stats --
    Leaderboard { period: LeaderboardPeriod },
}

impl Action {
    /// Returns `true` for handshake frames.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Hello { .. } | Self::AdminHello { .. })
    }

    /// Returns `true` for actions only an admin connection may send.
    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::Decide { .. } | Self::ListAwaitingAdmin)
    }

    /// Returns `true` for actions that need a verified participant.
    pub fn requires_participant(&self) -> bool {
        matches!(
            self,
            Self::CheckIn { .. }
                | Self::CheckOut { .. }
                | Self::CreateRequest { .. }
                | Self::AcceptRequest { .. }
                | Self::ReflexReady { .. }
                | Self::ReflexTap { .. }
                | Self::QuizReady { .. }
                | Self::QuizAnswer { .. }
        )
    }
}
