//! Write models: the inputs for inserts and updates.
//!
//! Ids and default fields are assigned by the store, so these carry only
//! what the caller decides.

use chrono::{DateTime, Utc};
use duelhall_protocol::{
    GameVariant, MatchResult, ParticipantId, RequestStatus, Scores, TableId,
    VenueId,
};

/// Fields of a freshly created game request. Status starts at Pending.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub venue_id: VenueId,
    pub from_table_id: TableId,
    pub from_participant: ParticipantId,
    pub variant: GameVariant,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A status change applied by [`Store::update_request_status`](crate::Store::update_request_status).
///
/// Approval is not here: it creates a match as well and goes through
/// [`Store::approve_request`](crate::Store::approve_request).
#[derive(Debug, Clone)]
pub enum RequestUpdate {
    /// Pending → AwaitAdmin, recording who accepted and the admin deadline.
    Accept {
        participant: ParticipantId,
        table_id: TableId,
        admin_expires_at: DateTime<Utc>,
    },
    /// AwaitAdmin → Denied.
    Deny,
    /// Pending/AwaitAdmin → Expired.
    Expire,
}

impl RequestUpdate {
    /// The status the request ends up in.
    pub fn target(&self) -> RequestStatus {
        match self {
            Self::Accept { .. } => RequestStatus::AwaitAdmin,
            Self::Deny => RequestStatus::Denied,
            Self::Expire => RequestStatus::Expired,
        }
    }
}

/// Fields of a match created from an approved request.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub venue_id: VenueId,
    pub variant: GameVariant,
    pub p1: ParticipantId,
    pub p1_table_id: TableId,
    pub p2: ParticipantId,
    pub p2_table_id: TableId,
    pub started_at: DateTime<Utc>,
}

/// The final outcome written once when a match settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub ended_at: DateTime<Utc>,
    pub result: MatchResult,
    pub scores: Scores,
    /// `None` on a draw.
    pub winner: Option<ParticipantId>,
}

/// Fields of a new check-in session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub participant: ParticipantId,
    pub venue_id: VenueId,
    pub table_id: TableId,
    pub public_id: String,
    pub started_at: DateTime<Utc>,
}
