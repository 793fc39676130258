//! # Duelhall
//!
//! Match orchestration for venue duel games.
//!
//! Participants check in at a table by scanning its QR code, propose a
//! duel to the other tables of the venue, and, once another table accepts
//! and the venue admin approves, play a live match: a five-round Reflex
//! duel or a five-question arithmetic Quiz. Every match is settled and
//! recorded exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use duelhall::prelude::*;
//!
//! # async fn run() -> Result<(), DuelError> {
//! let store = Arc::new(MemoryStore::new());
//! let venue = store.add_venue("Corner Cafe");
//! store.add_table(venue, "Table 1", "qr-table-1");
//!
//! let server = DuelhallServerBuilder::new()
//!     .bind("127.0.0.1:8080")
//!     .build(store, NumericTokenAuthenticator, StaticAdminKey::new("secret"))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logging;
mod orchestrator;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::DuelError;
pub use orchestrator::{LEADERBOARD_LIMIT, Orchestrator};
pub use server::{DuelhallServer, DuelhallServerBuilder, PROTOCOL_VERSION};

pub mod prelude {
    pub use crate::{
        ConfigError, DuelError, DuelhallServer, DuelhallServerBuilder, Orchestrator,
        PROTOCOL_VERSION, ServerConfig,
    };
    pub use duelhall_broadcast::{Broadcaster, ChannelHub, Subscription};
    pub use duelhall_lobby::{Decision, LobbyConfig};
    pub use duelhall_match::MatchConfig;
    pub use duelhall_protocol::{
        Action, ActiveRequest, Channel, ClientFrame, ErrorCode, Event, GameRequest, GameVariant,
        LeaderboardPeriod, MatchId, MatchRecord, MatchResult, ParticipantId, Reply, RequestId,
        RequestStatus, RoundEvent, Scores, ServerFrame, SessionId, TableId, VenueId,
    };
    pub use duelhall_session::{
        AdminGate, Authenticator, NumericTokenAuthenticator, SessionError, StaticAdminKey,
    };
    pub use duelhall_store::{MemoryStore, Store};
}
