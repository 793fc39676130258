//! In-process [`Store`] backed by hash maps.
//!
//! Used by the test suites and the demo server. All state sits behind one
//! `std::sync::Mutex`; no method holds the lock across an `.await` (none
//! of them await at all), so a blocking mutex is fine here.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, Duration, Utc};
use duelhall_protocol::{
    CheckInSession, GameRequest, LeaderboardEntry, LeaderboardPeriod, MatchId,
    MatchRecord, ParticipantId, RequestId, RequestStatus, Scores, SessionId,
    TableId, TableInfo, VenueId,
};

use tracing::{debug, warn};

use crate::{
    NewMatch, NewRequest, NewSession, RequestUpdate, Settlement, Store,
    StoreError,
};

#[derive(Debug, Clone)]
struct TableRow {
    id: TableId,
    venue_id: VenueId,
    label: String,
}

#[derive(Default)]
struct Inner {
    venues: HashMap<VenueId, String>,
    tables: HashMap<TableId, TableRow>,
    /// QR token → table.
    qr_tokens: HashMap<String, TableId>,
    sessions: HashMap<SessionId, CheckInSession>,
    requests: HashMap<RequestId, GameRequest>,
    matches: HashMap<MatchId, MatchRecord>,
    next_id: u64,
    /// Upcoming settlement writes that should fail.
    settlement_faults: u32,
    /// Upcoming approvals that should fail.
    approval_faults: u32,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_match(&mut self, new: NewMatch) -> MatchRecord {
        let record = MatchRecord {
            id: MatchId(self.next_id()),
            venue_id: new.venue_id,
            variant: new.variant,
            p1: new.p1,
            p1_table_id: new.p1_table_id,
            p2: new.p2,
            p2_table_id: new.p2_table_id,
            started_at: new.started_at,
            ended_at: None,
            result: None,
            scores: Scores::default(),
            winner: None,
        };
        self.matches.insert(record.id, record.clone());
        record
    }
}

/// A [`Store`] that keeps everything in memory.
///
/// Ids come from a single monotonic counter, so request ids are
/// monotonic as required.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a venue.
    pub fn add_venue(&self, name: &str) -> VenueId {
        let mut inner = self.lock();
        let id = VenueId(inner.next_id());
        inner.venues.insert(id, name.to_string());
        id
    }

    /// Registers a table with the QR token printed on it.
    pub fn add_table(&self, venue_id: VenueId, label: &str, qr_token: &str) -> TableId {
        let mut inner = self.lock();
        let id = TableId(inner.next_id());
        inner.tables.insert(
            id,
            TableRow {
                id,
                venue_id,
                label: label.to_string(),
            },
        );
        inner.qr_tokens.insert(qr_token.to_string(), id);
        id
    }

    /// Makes the next `count` settlement writes fail with
    /// [`StoreError::Unavailable`].
    pub fn inject_settlement_faults(&self, count: u32) {
        self.lock().settlement_faults = count;
    }

    /// Makes the next `count` approvals fail with
    /// [`StoreError::Unavailable`] without writing anything.
    pub fn inject_approval_faults(&self, count: u32) {
        self.lock().approval_faults = count;
    }

    /// Snapshot of a match record, settled or not.
    pub fn match_record(&self, id: MatchId) -> Option<MatchRecord> {
        self.lock().matches.get(&id).cloned()
    }

    /// Number of matches stored.
    pub fn match_count(&self) -> usize {
        self.lock().matches.len()
    }
}

/// Start of the leaderboard window containing `now`.
fn period_start(period: LeaderboardPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let first_day = match period {
        LeaderboardPeriod::Daily => today,
        LeaderboardPeriod::Weekly => {
            today - Duration::days(i64::from(now.weekday().num_days_from_monday()))
        }
    };
    first_day.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl Store for MemoryStore {
    async fn find_active_session_by_id(
        &self,
        id: SessionId,
    ) -> Result<Option<CheckInSession>, StoreError> {
        Ok(self
            .lock()
            .sessions
            .get(&id)
            .filter(|s| s.is_active())
            .cloned())
    }

    async fn find_table_by_qr(&self, qr_token: &str) -> Result<Option<TableInfo>, StoreError> {
        let inner = self.lock();
        let Some(table) = inner
            .qr_tokens
            .get(qr_token)
            .and_then(|id| inner.tables.get(id))
        else {
            return Ok(None);
        };
        Ok(Some(TableInfo {
            table_id: table.id,
            venue_id: table.venue_id,
            venue_name: inner
                .venues
                .get(&table.venue_id)
                .cloned()
                .unwrap_or_default(),
            label: table.label.clone(),
        }))
    }

    async fn insert_session(&self, new: NewSession) -> Result<CheckInSession, StoreError> {
        let mut inner = self.lock();
        let session = CheckInSession {
            id: SessionId(inner.next_id()),
            participant: new.participant,
            venue_id: new.venue_id,
            table_id: new.table_id,
            public_id: new.public_id,
            started_at: new.started_at,
            ended_at: None,
        };
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn end_session(&self, id: SessionId) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        if session.ended_at.is_some() {
            return Ok(false);
        }
        session.ended_at = Some(Utc::now());
        Ok(true)
    }

    async fn find_request_by_id(&self, id: RequestId) -> Result<Option<GameRequest>, StoreError> {
        Ok(self.lock().requests.get(&id).cloned())
    }

    async fn insert_request(&self, new: NewRequest) -> Result<GameRequest, StoreError> {
        let mut inner = self.lock();
        let request = GameRequest {
            id: RequestId(inner.next_id()),
            venue_id: new.venue_id,
            from_table_id: new.from_table_id,
            from_participant: new.from_participant,
            variant: new.variant,
            status: RequestStatus::Pending,
            created_at: new.created_at,
            expires_at: new.expires_at,
            admin_expires_at: None,
            accepted_by: None,
            accepted_table_id: None,
        };
        inner.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn update_request_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        update: RequestUpdate,
    ) -> Result<Option<GameRequest>, StoreError> {
        let target = update.target();
        if !expected.can_transition_to(target) {
            return Err(StoreError::IllegalTransition {
                from: expected,
                to: target,
            });
        }

        let mut inner = self.lock();
        let request = inner
            .requests
            .get_mut(&id)
            .ok_or(StoreError::RequestNotFound(id))?;
        if request.status != expected {
            debug!(%id, %expected, actual = %request.status, "request status compare-and-set missed");
            return Ok(None);
        }

        request.status = target;
        if let RequestUpdate::Accept {
            participant,
            table_id,
            admin_expires_at,
        } = update
        {
            request.accepted_by = Some(participant);
            request.accepted_table_id = Some(table_id);
            request.admin_expires_at = Some(admin_expires_at);
        }
        Ok(Some(request.clone()))
    }

    async fn approve_request(
        &self,
        id: RequestId,
        new: NewMatch,
    ) -> Result<Option<(GameRequest, MatchRecord)>, StoreError> {
        let mut inner = self.lock();
        if inner.approval_faults > 0 {
            inner.approval_faults -= 1;
            warn!(%id, "injected approval fault");
            return Err(StoreError::Unavailable("injected approval fault".into()));
        }

        let request = inner
            .requests
            .get_mut(&id)
            .ok_or(StoreError::RequestNotFound(id))?;
        if request.status != RequestStatus::AwaitAdmin {
            debug!(%id, actual = %request.status, "approval missed, request no longer awaiting admin");
            return Ok(None);
        }
        request.status = RequestStatus::Approved;
        let approved = request.clone();

        let record = inner.insert_match(new);
        Ok(Some((approved, record)))
    }

    async fn list_open_requests(
        &self,
        venue: Option<VenueId>,
    ) -> Result<Vec<GameRequest>, StoreError> {
        let mut open: Vec<GameRequest> = self
            .lock()
            .requests
            .values()
            .filter(|r| !r.status.is_terminal())
            .filter(|r| venue.is_none_or(|v| r.venue_id == v))
            .cloned()
            .collect();
        open.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(open)
    }

    async fn insert_match(&self, new: NewMatch) -> Result<MatchRecord, StoreError> {
        Ok(self.lock().insert_match(new))
    }

    async fn find_match_by_id(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.lock().matches.get(&id).cloned())
    }

    async fn update_match_settlement(
        &self,
        id: MatchId,
        settlement: Settlement,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.settlement_faults > 0 {
            inner.settlement_faults -= 1;
            warn!(%id, "injected settlement fault");
            return Err(StoreError::Unavailable("injected settlement fault".into()));
        }
        let record = inner
            .matches
            .get_mut(&id)
            .ok_or(StoreError::MatchNotFound(id))?;
        if record.is_settled() {
            debug!(%id, "settlement rejected, match already settled");
            return Ok(false);
        }
        record.ended_at = Some(settlement.ended_at);
        record.result = Some(settlement.result);
        record.scores = settlement.scores;
        record.winner = settlement.winner;
        Ok(true)
    }

    async fn count_matches_today(&self, participant: ParticipantId) -> Result<u32, StoreError> {
        let today = Utc::now().date_naive();
        let count = self
            .lock()
            .matches
            .values()
            .filter(|m| m.p1 == participant || m.p2 == participant)
            .filter(|m| m.started_at.date_naive() == today)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let since = period_start(period, Utc::now());
        let mut wins: HashMap<ParticipantId, u32> = HashMap::new();
        for record in self.lock().matches.values() {
            if record.started_at < since {
                continue;
            }
            if let Some(winner) = record.winner {
                *wins.entry(winner).or_default() += 1;
            }
        }

        let mut entries: Vec<LeaderboardEntry> = wins
            .into_iter()
            .map(|(participant, wins)| LeaderboardEntry { participant, wins })
            .collect();
        entries.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.participant.cmp(&b.participant)));
        entries.truncate(limit);
        Ok(entries)
    }
}

// =========================================================================
// Tests
// =========================================================================
