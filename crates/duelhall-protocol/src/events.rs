//! Outbound traffic: channel events, replies, and the server frame.

use serde::{Deserialize, Serialize};

use crate::{
    ActiveRequest, Channel, CheckInSession, ErrorCode, GameInfo, GameRequest,
    LeaderboardEntry, MatchId, MatchRecord, MatchResult, ParticipantId,
    QuizQuestion, RequestId, Scores, Seat, TableInfo,
};

// ---------------------------------------------------------------------------
// Event: published on channels
// ---------------------------------------------------------------------------

/// An event published on a venue or match channel.
///
/// Adjacently tagged so the wire names match what clients listen for:
/// `{ "event": "request.created", "payload": { "request": { ... } } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    /// A table proposed a game. Venue channel.
    #[serde(rename = "request.created")]
    RequestCreated { request: GameRequest },

    /// Another table accepted; waiting for the admin. Venue channel.
    #[serde(rename = "request.accepted")]
    RequestAccepted { request: GameRequest },

    /// The admin approved and a match exists. Venue channel.
    #[serde(rename = "request.approved")]
    RequestApproved {
        request_id: RequestId,
        #[serde(rename = "match")]
        record: MatchRecord,
    },

    /// The admin denied the request. Venue channel.
    #[serde(rename = "request.denied")]
    RequestDenied { request_id: RequestId },

    /// The request lapsed before reaching a decision. Venue channel.
    #[serde(rename = "request.expired")]
    RequestExpired { request_id: RequestId },

    /// The live match is ready for play. Match channel.
    #[serde(rename = "match.started")]
    MatchStarted {
        #[serde(rename = "match")]
        record: MatchRecord,
    },

    /// Reflex round progress. Match channel.
    #[serde(rename = "reflex.round")]
    ReflexRound(RoundEvent),

    /// The full quiz, sent to both players at once. Match channel.
    #[serde(rename = "quiz.questions")]
    QuizQuestions { questions: Vec<QuizQuestion> },

    /// Terminal event, published exactly once per match. Match channel.
    #[serde(rename = "match.ended")]
    MatchEnded {
        match_id: MatchId,
        result: MatchResult,
        scores: Scores,
    },
}

impl Event {
    /// The wire name of the event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestCreated { .. } => "request.created",
            Self::RequestAccepted { .. } => "request.accepted",
            Self::RequestApproved { .. } => "request.approved",
            Self::RequestDenied { .. } => "request.denied",
            Self::RequestExpired { .. } => "request.expired",
            Self::MatchStarted { .. } => "match.started",
            Self::ReflexRound(_) => "reflex.round",
            Self::QuizQuestions { .. } => "quiz.questions",
            Self::MatchEnded { .. } => "match.ended",
        }
    }
}

/// Reflex round progress, discriminated by `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A round started; `go` follows after a random delay.
    GetReady { round: u32, scores: Scores },
    /// Tap now.
    Go { round: u32 },
    /// `by` tapped first after `go`.
    Won {
        round: u32,
        by: Seat,
        reaction_ms: u64,
        scores: Scores,
    },
    /// `by` tapped before `go`; the opponent got the point.
    FalseStart { round: u32, by: Seat, scores: Scores },
    /// Nobody tapped in time; no point.
    Timeout { round: u32 },
}

// ---------------------------------------------------------------------------
// Reply: direct answers to a ClientFrame
// ---------------------------------------------------------------------------

/// The successful answer to a client action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Reply {
    /// Handshake accepted.
    Welcome {
        participant: Option<ParticipantId>,
        admin: bool,
        /// Milliseconds since the Unix epoch, for client clock sync.
        server_time: i64,
    },
    Pong,
    Subscribed { channel: Channel },
    Unsubscribed { channel: Channel },
    Games { games: Vec<GameInfo> },
    CheckedIn {
        session: CheckInSession,
        table: TableInfo,
    },
    CheckedOut,
    Request { request: GameRequest },
    Requests { requests: Vec<ActiveRequest> },
    Match {
        #[serde(rename = "match")]
        record: MatchRecord,
    },
    Denied { request_id: RequestId },
    /// The action was applied (or deliberately ignored, e.g. a second
    /// tap in a resolved round).
    Ack,
    Leaderboard { entries: Vec<LeaderboardEntry> },
}

// ---------------------------------------------------------------------------
// ServerFrame: what the gateway writes to a socket
// ---------------------------------------------------------------------------

/// A server → client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Success answer to the client frame with the same `id`.
    Reply { id: u64, body: Reply },
    /// Failure answer to the client frame with the same `id`.
    Error {
        id: u64,
        code: ErrorCode,
        message: String,
    },
    /// An event from a channel this socket subscribed to.
    Event { channel: Channel, event: Event },
}
