//! Identifiers and records shared by every Duelhall crate.
//!
//! These are the fields the engine reads from and writes to storage, and
//! the payloads events carry to clients, so they all derive serde.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a `u64` newtype identifier.
///
/// `#[serde(transparent)]` keeps the wire format a plain number, so
/// `RequestId(42)` is `42` in JSON, not `{"0":42}`. The display prefix is
/// only for logs.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A physical venue (cafe) grouping tables and requests.
    VenueId, "V"
);
id_type!(
    /// A physical table inside a venue.
    TableId, "T"
);
id_type!(
    /// A verified player identity.
    ParticipantId, "P"
);
id_type!(
    /// A check-in session binding a participant to a table.
    SessionId, "S"
);
id_type!(
    /// A game request. Monotonic.
    RequestId, "REQ"
);
id_type!(
    /// A match created by an approved request.
    MatchId, "M"
);

// ---------------------------------------------------------------------------
// Channel: named fan-out groups
// ---------------------------------------------------------------------------

/// A logical broadcast channel.
///
/// On the wire a channel is its name: `"venue:3"` or `"match:17"`.
/// Subscribers join a channel explicitly before they receive its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Channel {
    /// Request lifecycle events for one venue.
    Venue(VenueId),
    /// Live game events for one match.
    Match(MatchId),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Venue(id) => write!(f, "venue:{}", id.0),
            Self::Match(id) => write!(f, "match:{}", id.0),
        }
    }
}

impl FromStr for Channel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidMessage(format!("invalid channel name: {s}"));
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        let id: u64 = id.parse().map_err(|_| invalid())?;
        match kind {
            "venue" => Ok(Self::Venue(VenueId(id))),
            "match" => Ok(Self::Match(MatchId(id))),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}

// ---------------------------------------------------------------------------
// Game variants
// ---------------------------------------------------------------------------

/// The game a request proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameVariant {
    /// Reaction-time duel, best of 5.
    Reflex,
    /// Five arithmetic questions, raced independently.
    Quiz,
}

impl GameVariant {
    /// Human-readable title shown in the game catalog.
    pub fn title(self) -> &'static str {
        match self {
            Self::Reflex => "Reflex Duel (best of 5)",
            Self::Quiz => "Quick Arithmetic (5 questions)",
        }
    }

    /// Every playable variant, in display order.
    pub fn catalog() -> Vec<GameInfo> {
        [Self::Reflex, Self::Quiz]
            .into_iter()
            .map(|variant| GameInfo {
                variant,
                title: variant.title().to_string(),
            })
            .collect()
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reflex => f.write_str("reflex"),
            Self::Quiz => f.write_str("quiz"),
        }
    }
}

/// An entry of the game catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub variant: GameVariant,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Seats and scores
// ---------------------------------------------------------------------------

/// Which side of a match a participant plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    /// The participant who created the request.
    P1,
    /// The participant who accepted it.
    P2,
}

impl Seat {
    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P1 => f.write_str("p1"),
            Self::P2 => f.write_str("p2"),
        }
    }
}

/// Running or final scores of a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub p1: u32,
    pub p2: u32,
}

impl Scores {
    pub fn new(p1: u32, p2: u32) -> Self {
        Self { p1, p2 }
    }

    pub fn get(&self, seat: Seat) -> u32 {
        match seat {
            Seat::P1 => self.p1,
            Seat::P2 => self.p2,
        }
    }

    /// Adds one point to `seat`.
    pub fn award(&mut self, seat: Seat) {
        match seat {
            Seat::P1 => self.p1 += 1,
            Seat::P2 => self.p2 += 1,
        }
    }

    /// The higher of the two scores.
    pub fn leader(&self) -> u32 {
        self.p1.max(self.p2)
    }
}

/// Outcome of a settled match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "P1_WIN")]
    P1Win,
    #[serde(rename = "P2_WIN")]
    P2Win,
    #[serde(rename = "DRAW")]
    Draw,
}

impl MatchResult {
    /// Compares the final scores: higher score wins, equal is a draw.
    pub fn from_scores(scores: &Scores) -> Self {
        use std::cmp::Ordering;
        match scores.p1.cmp(&scores.p2) {
            Ordering::Greater => Self::P1Win,
            Ordering::Less => Self::P2Win,
            Ordering::Equal => Self::Draw,
        }
    }

    /// The winning seat, or `None` on a draw.
    pub fn winner(self) -> Option<Seat> {
        match self {
            Self::P1Win => Some(Seat::P1),
            Self::P2Win => Some(Seat::P2),
            Self::Draw => None,
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P1Win => f.write_str("P1_WIN"),
            Self::P2Win => f.write_str("P2_WIN"),
            Self::Draw => f.write_str("DRAW"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game requests
// ---------------------------------------------------------------------------

/// Lifecycle of a game request.
///
/// ```text
/// Pending ──accept──→ AwaitAdmin ──approve──→ Approved
///    │                    │  └──────deny────→ Denied
///    └──────expiry────────┴─────────────────→ Expired
/// ```
///
/// Transitions only move forward; the three right-hand states are
/// terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    AwaitAdmin,
    Approved,
    Denied,
    Expired,
}

impl RequestStatus {
    /// Returns `true` for Approved, Denied, and Expired.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Expired)
    }

    /// Returns `true` if moving from `self` to `target` is a legal step.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::AwaitAdmin)
                | (Self::Pending, Self::Expired)
                | (Self::AwaitAdmin, Self::Approved)
                | (Self::AwaitAdmin, Self::Denied)
                | (Self::AwaitAdmin, Self::Expired)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::AwaitAdmin => "AWAIT_ADMIN",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// A proposal from one table to play a variant, open to any other table
/// at the same venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRequest {
    pub id: RequestId,
    pub venue_id: VenueId,
    pub from_table_id: TableId,
    pub from_participant: ParticipantId,
    pub variant: GameVariant,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// Primary expiry, relevant while Pending.
    pub expires_at: DateTime<Utc>,
    /// Secondary (admin) expiry, relevant while AwaitAdmin.
    pub admin_expires_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<ParticipantId>,
    pub accepted_table_id: Option<TableId>,
}

impl GameRequest {
    /// The expiry that applies to the current status, if any.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.status {
            RequestStatus::Pending => Some(self.expires_at),
            RequestStatus::AwaitAdmin => self.admin_expires_at,
            _ => None,
        }
    }

    /// Returns `true` if the request is non-terminal and its relevant
    /// expiry is at or before `now`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Time left until the relevant expiry, `None` once lapsed or terminal.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let deadline = self.deadline()?;
        (deadline - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

/// A non-terminal request annotated with its countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRequest {
    #[serde(flatten)]
    pub request: GameRequest,
    /// Milliseconds until the relevant expiry.
    pub remaining_ms: u64,
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// The persisted record of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub venue_id: VenueId,
    pub variant: GameVariant,
    pub p1: ParticipantId,
    pub p1_table_id: TableId,
    pub p2: ParticipantId,
    pub p2_table_id: TableId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: Option<MatchResult>,
    pub scores: Scores,
    pub winner: Option<ParticipantId>,
}

impl MatchRecord {
    /// The seat a participant occupies in this match.
    pub fn seat_of(&self, participant: ParticipantId) -> Option<Seat> {
        if participant == self.p1 {
            Some(Seat::P1)
        } else if participant == self.p2 {
            Some(Seat::P2)
        } else {
            None
        }
    }

    pub fn participant(&self, seat: Seat) -> ParticipantId {
        match seat {
            Seat::P1 => self.p1,
            Seat::P2 => self.p2,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.ended_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Quiz questions
// ---------------------------------------------------------------------------

/// Arithmetic operator of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Sub,
    Mul,
}

impl Operator {
    pub const ALL: [Operator; 3] = [Operator::Add, Operator::Sub, Operator::Mul];

    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '×',
        }
    }
}

/// A quiz question as shown to players. The answer is never sent; it is
/// whatever `lhs op rhs` evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub index: usize,
    pub lhs: i64,
    pub op: Operator,
    pub rhs: i64,
}

impl QuizQuestion {
    pub fn answer(&self) -> i64 {
        self.op.apply(self.lhs, self.rhs)
    }
}

impl fmt::Display for QuizQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.symbol(), self.rhs)
    }
}

// ---------------------------------------------------------------------------
// Check-in and venue
// ---------------------------------------------------------------------------

/// A participant's presence at a table, created by scanning its QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInSession {
    pub id: SessionId,
    pub participant: ParticipantId,
    pub venue_id: VenueId,
    pub table_id: TableId,
    /// Short random handle shown to other tables instead of the
    /// participant id.
    pub public_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CheckInSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// What a QR token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_id: TableId,
    pub venue_id: VenueId,
    pub venue_name: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
    /// Since 00:00 UTC today.
    Daily,
    /// Since Monday 00:00 UTC.
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant: ParticipantId,
    pub wins: u32,
}

// =========================================================================
// Tests
// =========================================================================
