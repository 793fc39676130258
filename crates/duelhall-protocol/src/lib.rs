//! Data model and wire protocol for Duelhall.
//!
//! This crate defines everything that crosses a boundary between the
//! engine and the outside world:
//!
//! - **Identifiers and records** ([`GameRequest`], [`MatchRecord`],
//!   [`CheckInSession`], ...): the fields the engine reads from and writes
//!   to storage, and that events carry to clients.
//! - **Channels** ([`Channel`]): the named fan-out groups (`venue:{id}`,
//!   `match:{id}`) events are published to.
//! - **Actions and events** ([`Action`], [`Event`], [`RoundEvent`]):
//!   tagged enums for everything a client can ask and everything the
//!   engine can announce.
//! - **Frames** ([`ClientFrame`], [`ServerFrame`]): the envelopes used by
//!   the WebSocket gateway.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, types out.
//!
//! ```text
//! Gateway (bytes) → Protocol (ClientFrame) → Orchestrator (Action)
//! ```

mod actions;
mod codec;
mod error;
mod events;
mod types;

pub use actions::{Action, ClientFrame};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ErrorCode, ProtocolError};
pub use events::{Event, Reply, RoundEvent, ServerFrame};
pub use types::{
    ActiveRequest, Channel, CheckInSession, GameInfo, GameRequest,
    GameVariant, LeaderboardEntry, LeaderboardPeriod, MatchId, MatchRecord,
    MatchResult, Operator, ParticipantId, QuizQuestion, RequestId,
    RequestStatus, Scores, Seat, SessionId, TableId, TableInfo, VenueId,
};
