//! The orchestrator: one entry point for every engine operation.
//!
//! The gateway (or any other front end) talks only to [`Orchestrator`].
//! It wires check-in, the request lifecycle, and the match engine to one
//! shared store and broadcaster, and starts play the moment the admin
//! approves a request.

use std::sync::Arc;

use duelhall_broadcast::Broadcaster;
use duelhall_lobby::{Decision, LobbyConfig, RequestManager};
use duelhall_match::{MatchConfig, MatchEngine};
use duelhall_protocol::{
    ActiveRequest, GameInfo, GameRequest, GameVariant, LeaderboardEntry,
    LeaderboardPeriod, MatchId, ParticipantId, RequestId, SessionId, VenueId,
};
use duelhall_session::{CheckIn, CheckInDesk};
use duelhall_store::Store;
use tokio::task::JoinHandle;

use crate::DuelError;

/// Rows returned by [`Orchestrator::leaderboard`].
pub const LEADERBOARD_LIMIT: usize = 20;

pub struct Orchestrator<S, B> {
    store: Arc<S>,
    desk: CheckInDesk<S>,
    requests: Arc<RequestManager<S, B>>,
    engine: MatchEngine<S, B>,
}

impl<S: Store, B: Broadcaster> Orchestrator<S, B> {
    pub fn new(
        store: Arc<S>,
        broadcaster: Arc<B>,
        lobby: LobbyConfig,
        matches: MatchConfig,
    ) -> Self {
        Self {
            desk: CheckInDesk::new(Arc::clone(&store)),
            requests: Arc::new(RequestManager::new(
                Arc::clone(&store),
                Arc::clone(&broadcaster),
                lobby,
            )),
            engine: MatchEngine::new(Arc::clone(&store), broadcaster, matches),
            store,
        }
    }

    pub fn engine(&self) -> &MatchEngine<S, B> {
        &self.engine
    }

    /// Starts the background expiry sweep. Abort the handle to stop it.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        RequestManager::spawn_sweeper(Arc::clone(&self.requests))
    }

    // -- Check-in --

    pub async fn check_in(
        &self,
        participant: ParticipantId,
        qr_token: &str,
    ) -> Result<CheckIn, DuelError> {
        Ok(self.desk.check_in(participant, qr_token).await?)
    }

    pub async fn check_out(
        &self,
        participant: ParticipantId,
        session_id: SessionId,
    ) -> Result<(), DuelError> {
        Ok(self.desk.check_out(participant, session_id).await?)
    }

    /// The variants a table can propose.
    pub fn list_games(&self) -> Vec<GameInfo> {
        GameVariant::catalog()
    }

    // -- Request lifecycle --

    pub async fn create_request(
        &self,
        participant: ParticipantId,
        session_id: SessionId,
        variant: GameVariant,
    ) -> Result<GameRequest, DuelError> {
        Ok(self.requests.create(participant, session_id, variant).await?)
    }

    pub async fn accept_request(
        &self,
        participant: ParticipantId,
        request_id: RequestId,
        session_id: SessionId,
    ) -> Result<GameRequest, DuelError> {
        Ok(self.requests.accept(participant, request_id, session_id).await?)
    }

    /// Applies the admin's decision. On approval the new match is live
    /// (and `match.started` published) before this returns.
    pub async fn decide(&self, request_id: RequestId, approve: bool) -> Result<Decision, DuelError> {
        let decision = self.requests.decide(request_id, approve).await?;
        if let Decision::Approved(record) = &decision {
            if let Err(e) = self.engine.launch(record) {
                tracing::error!(%request_id, match_id = %record.id, error = %e, "approved match failed to launch");
                return Err(e.into());
            }
        }
        Ok(decision)
    }

    pub async fn find_request(&self, request_id: RequestId) -> Result<GameRequest, DuelError> {
        Ok(self.requests.find(request_id).await?)
    }

    pub async fn list_active_requests(&self, venue: VenueId) -> Result<Vec<ActiveRequest>, DuelError> {
        Ok(self.requests.list_active(venue).await?)
    }

    pub async fn list_awaiting_admin(&self) -> Result<Vec<ActiveRequest>, DuelError> {
        Ok(self.requests.list_awaiting_admin().await?)
    }

    // -- Live play --

    pub async fn reflex_ready(&self, participant: ParticipantId, match_id: MatchId) -> Result<(), DuelError> {
        Ok(self.engine.reflex_ready(match_id, participant).await?)
    }

    pub async fn reflex_tap(&self, participant: ParticipantId, match_id: MatchId) -> Result<(), DuelError> {
        Ok(self.engine.reflex_tap(match_id, participant).await?)
    }

    pub async fn quiz_ready(&self, participant: ParticipantId, match_id: MatchId) -> Result<(), DuelError> {
        Ok(self.engine.quiz_ready(match_id, participant).await?)
    }

    pub async fn quiz_answer(
        &self,
        participant: ParticipantId,
        match_id: MatchId,
        index: usize,
        value: i64,
    ) -> Result<(), DuelError> {
        Ok(self.engine.quiz_answer(match_id, participant, index, value).await?)
    }

    // -- Stats --

    /// Top winners of the day or week.
    pub async fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>, DuelError> {
        Ok(self.store.leaderboard(period, LEADERBOARD_LIMIT).await?)
    }
}
