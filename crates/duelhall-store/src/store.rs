//! The [`Store`] trait.

use std::future::Future;

use duelhall_protocol::{
    CheckInSession, GameRequest, LeaderboardEntry, LeaderboardPeriod, MatchId,
    MatchRecord, ParticipantId, RequestId, RequestStatus, SessionId,
    TableInfo, VenueId,
};

use crate::{NewMatch, NewRequest, NewSession, RequestUpdate, Settlement, StoreError};

/// Reads and writes the engine performs against durable storage.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one store is shared (behind an `Arc`)
/// by the request manager, every match actor, and every connection task.
/// The returned futures are `Send` so they can be awaited inside spawned
/// tasks.
pub trait Store: Send + Sync + 'static {
    // -- Sessions and tables --

    /// Looks up a check-in session that has not ended.
    fn find_active_session_by_id(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<CheckInSession>, StoreError>> + Send;

    /// Resolves the QR token printed on a table.
    fn find_table_by_qr(
        &self,
        qr_token: &str,
    ) -> impl Future<Output = Result<Option<TableInfo>, StoreError>> + Send;

    fn insert_session(
        &self,
        session: NewSession,
    ) -> impl Future<Output = Result<CheckInSession, StoreError>> + Send;

    /// Ends a session. Returns `false` if it had already ended.
    fn end_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // -- Requests --

    fn find_request_by_id(
        &self,
        id: RequestId,
    ) -> impl Future<Output = Result<Option<GameRequest>, StoreError>> + Send;

    fn insert_request(
        &self,
        request: NewRequest,
    ) -> impl Future<Output = Result<GameRequest, StoreError>> + Send;

    /// Compare-and-set status change.
    ///
    /// Applies `update` only if the stored status equals `expected`.
    /// Returns the updated request, or `Ok(None)` if another writer got
    /// there first.
    ///
    /// # Errors
    /// - [`StoreError::RequestNotFound`] for an unknown id
    /// - [`StoreError::IllegalTransition`] if `expected → update.target()`
    ///   is not a lifecycle step
    fn update_request_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        update: RequestUpdate,
    ) -> impl Future<Output = Result<Option<GameRequest>, StoreError>> + Send;

    /// Approves an AwaitAdmin request and creates its match in one step.
    ///
    /// Either both writes land or neither does: a failed call leaves the
    /// request in AwaitAdmin with no match, so the decision can be
    /// retried. Returns `Ok(None)` if the request was no longer in
    /// AwaitAdmin.
    ///
    /// # Errors
    /// - [`StoreError::RequestNotFound`] for an unknown id
    fn approve_request(
        &self,
        id: RequestId,
        new: NewMatch,
    ) -> impl Future<Output = Result<Option<(GameRequest, MatchRecord)>, StoreError>> + Send;

    /// Non-terminal requests, newest first. `None` means every venue.
    fn list_open_requests(
        &self,
        venue: Option<VenueId>,
    ) -> impl Future<Output = Result<Vec<GameRequest>, StoreError>> + Send;

    // -- Matches --

    fn insert_match(
        &self,
        new: NewMatch,
    ) -> impl Future<Output = Result<MatchRecord, StoreError>> + Send;

    fn find_match_by_id(
        &self,
        id: MatchId,
    ) -> impl Future<Output = Result<Option<MatchRecord>, StoreError>> + Send;

    /// Writes the final outcome. Returns `false` (and writes nothing) if the
    /// match was already settled.
    fn update_match_settlement(
        &self,
        id: MatchId,
        settlement: Settlement,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Matches the participant started today (UTC), on either seat.
    fn count_matches_today(
        &self,
        participant: ParticipantId,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Winners ranked by wins in the period, most wins first.
    fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LeaderboardEntry>, StoreError>> + Send;
}
