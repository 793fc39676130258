//! The request manager: every transition of a game request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duelhall_broadcast::Broadcaster;
use duelhall_protocol::{
    ActiveRequest, Channel, Event, GameRequest, GameVariant, MatchRecord,
    ParticipantId, RequestId, RequestStatus, SessionId, VenueId,
};
use duelhall_session::owned_session;
use duelhall_store::{NewMatch, NewRequest, RequestUpdate, Store};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{LobbyConfig, LobbyError, QuotaGuard};

/// Outcome of an admin decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The match was created; it still has to be launched.
    Approved(MatchRecord),
    Denied(RequestId),
}

/// Owns the request lifecycle.
///
/// Expiry is applied lazily: any operation that reads a request whose
/// relevant deadline has passed moves it to EXPIRED first. The sweeper
/// started by [`spawn_sweeper`](Self::spawn_sweeper) catches requests
/// nobody reads.
pub struct RequestManager<S, B> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    quota: QuotaGuard<S>,
    config: LobbyConfig,
}

impl<S: Store, B: Broadcaster> RequestManager<S, B> {
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, config: LobbyConfig) -> Self {
        Self {
            quota: QuotaGuard::new(Arc::clone(&store), config.daily_quota),
            store,
            broadcaster,
            config,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    /// Opens a request from the caller's table.
    ///
    /// # Errors
    /// - session errors if `session_id` is invalid or not the caller's
    /// - [`LobbyError::QuotaExceeded`] if the daily limit is used up
    pub async fn create(
        &self,
        participant: ParticipantId,
        session_id: SessionId,
        variant: GameVariant,
    ) -> Result<GameRequest, LobbyError> {
        let session = owned_session(self.store.as_ref(), participant, session_id).await?;
        self.quota.check(participant).await?;

        let now = Utc::now();
        let request = self
            .store
            .insert_request(NewRequest {
                venue_id: session.venue_id,
                from_table_id: session.table_id,
                from_participant: participant,
                variant,
                created_at: now,
                expires_at: after(now, self.config.request_ttl),
            })
            .await?;

        tracing::info!(
            request_id = %request.id,
            %participant,
            venue_id = %request.venue_id,
            %variant,
            "request created"
        );
        self.broadcaster.publish(
            Channel::Venue(request.venue_id),
            Event::RequestCreated {
                request: request.clone(),
            },
        );
        Ok(request)
    }

    /// Accepts a pending request from another table of the same venue.
    ///
    /// Only the first acceptor wins; later ones see
    /// [`LobbyError::InvalidState`].
    pub async fn accept(
        &self,
        participant: ParticipantId,
        request_id: RequestId,
        session_id: SessionId,
    ) -> Result<GameRequest, LobbyError> {
        let session = owned_session(self.store.as_ref(), participant, session_id).await?;
        let request = self.load(request_id).await?;

        if request.venue_id != session.venue_id {
            return Err(LobbyError::WrongVenue {
                request: request_id,
                request_venue: request.venue_id,
                session_venue: session.venue_id,
            });
        }
        if request.from_table_id == session.table_id {
            return Err(LobbyError::SelfAccept {
                request: request_id,
                table: session.table_id,
            });
        }

        let now = Utc::now();
        let request = self.expire_if_lapsed(request, now).await?;
        require_status(&request, RequestStatus::Pending)?;

        let update = RequestUpdate::Accept {
            participant,
            table_id: session.table_id,
            admin_expires_at: after(now, self.config.admin_ttl),
        };
        let Some(accepted) = self
            .store
            .update_request_status(request_id, RequestStatus::Pending, update)
            .await?
        else {
            return Err(self.lost_race(request_id, RequestStatus::Pending).await);
        };

        tracing::info!(
            %request_id,
            %participant,
            table_id = %session.table_id,
            "request accepted, awaiting admin"
        );
        self.broadcaster.publish(
            Channel::Venue(accepted.venue_id),
            Event::RequestAccepted {
                request: accepted.clone(),
            },
        );
        Ok(accepted)
    }

    /// Admin decision on an accepted request.
    ///
    /// Approving flips the status and creates the match record in one
    /// store write, so a failed approval can be retried. It does not start
    /// play; the caller hands the record to the match engine.
    pub async fn decide(
        &self,
        request_id: RequestId,
        approve: bool,
    ) -> Result<Decision, LobbyError> {
        let request = self.load(request_id).await?;
        let request = self.expire_if_lapsed(request, Utc::now()).await?;
        require_status(&request, RequestStatus::AwaitAdmin)?;

        if !approve {
            let Some(denied) = self
                .store
                .update_request_status(request_id, RequestStatus::AwaitAdmin, RequestUpdate::Deny)
                .await?
            else {
                return Err(self.lost_race(request_id, RequestStatus::AwaitAdmin).await);
            };
            tracing::info!(%request_id, "request denied");
            self.broadcaster
                .publish(Channel::Venue(denied.venue_id), Event::RequestDenied { request_id });
            return Ok(Decision::Denied(request_id));
        }

        let (Some(p2), Some(p2_table_id)) = (request.accepted_by, request.accepted_table_id) else {
            return Err(LobbyError::MissingAcceptor(request_id));
        };
        let new = NewMatch {
            venue_id: request.venue_id,
            variant: request.variant,
            p1: request.from_participant,
            p1_table_id: request.from_table_id,
            p2,
            p2_table_id,
            started_at: Utc::now(),
        };
        let Some((approved, record)) = self.store.approve_request(request_id, new).await? else {
            return Err(self.lost_race(request_id, RequestStatus::AwaitAdmin).await);
        };

        tracing::info!(%request_id, match_id = %record.id, "request approved");
        self.broadcaster.publish(
            Channel::Venue(approved.venue_id),
            Event::RequestApproved {
                request_id,
                record: record.clone(),
            },
        );
        Ok(Decision::Approved(record))
    }

    /// Reads a request, expiring it first if its deadline has passed.
    pub async fn find(&self, request_id: RequestId) -> Result<GameRequest, LobbyError> {
        let request = self.load(request_id).await?;
        self.expire_if_lapsed(request, Utc::now()).await
    }

    /// Open requests of a venue with their countdowns, newest first.
    pub async fn list_active(&self, venue: VenueId) -> Result<Vec<ActiveRequest>, LobbyError> {
        let open = self.store.list_open_requests(Some(venue)).await?;
        self.annotate(open, usize::MAX).await
    }

    /// Requests waiting for an admin decision, newest first.
    pub async fn list_awaiting_admin(&self) -> Result<Vec<ActiveRequest>, LobbyError> {
        let waiting: Vec<GameRequest> = self
            .store
            .list_open_requests(None)
            .await?
            .into_iter()
            .filter(|r| r.status == RequestStatus::AwaitAdmin)
            .collect();
        self.annotate(waiting, self.config.admin_list_limit).await
    }

    /// Expires every open request whose deadline has passed. Returns how
    /// many this call expired.
    pub async fn expire_lapsed(&self) -> Result<usize, LobbyError> {
        let now = Utc::now();
        let mut expired = 0;
        for request in self.store.list_open_requests(None).await? {
            if request.is_lapsed(now) && self.expire(&request).await? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Runs [`expire_lapsed`](Self::expire_lapsed) every
    /// `sweep_interval` until the task is aborted.
    pub fn spawn_sweeper(manager: Arc<Self>) -> JoinHandle<()> {
        let period = manager.config.sweep_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match manager.expire_lapsed().await {
                    Ok(0) => {}
                    Ok(count) => tracing::debug!(count, "sweeper expired requests"),
                    Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
                }
            }
        })
    }

    async fn load(&self, request_id: RequestId) -> Result<GameRequest, LobbyError> {
        self.store
            .find_request_by_id(request_id)
            .await?
            .ok_or(LobbyError::NotFound(request_id))
    }

    /// Drops lapsed requests (expiring them) and attaches countdowns.
    async fn annotate(
        &self,
        requests: Vec<GameRequest>,
        limit: usize,
    ) -> Result<Vec<ActiveRequest>, LobbyError> {
        let now = Utc::now();
        let mut active = Vec::new();
        for request in requests {
            if active.len() >= limit {
                break;
            }
            match request.remaining(now) {
                Some(left) => active.push(ActiveRequest {
                    request,
                    remaining_ms: u64::try_from(left.as_millis()).unwrap_or(u64::MAX),
                }),
                None => {
                    self.expire(&request).await?;
                }
            }
        }
        Ok(active)
    }

    async fn expire_if_lapsed(
        &self,
        request: GameRequest,
        now: DateTime<Utc>,
    ) -> Result<GameRequest, LobbyError> {
        if !request.is_lapsed(now) {
            return Ok(request);
        }
        self.expire(&request).await?;
        self.load(request.id).await
    }

    /// Moves a request to EXPIRED. Only the caller whose compare-and-set
    /// lands publishes `request.expired`.
    async fn expire(&self, request: &GameRequest) -> Result<bool, LobbyError> {
        let updated = self
            .store
            .update_request_status(request.id, request.status, RequestUpdate::Expire)
            .await?;
        let Some(expired) = updated else {
            return Ok(false);
        };

        tracing::info!(request_id = %expired.id, from = %request.status, "request expired");
        self.broadcaster.publish(
            Channel::Venue(expired.venue_id),
            Event::RequestExpired {
                request_id: expired.id,
            },
        );
        Ok(true)
    }

    /// The error for a caller whose compare-and-set lost.
    async fn lost_race(&self, request_id: RequestId, expected: RequestStatus) -> LobbyError {
        match self.load(request_id).await {
            Ok(current) => {
                tracing::debug!(%request_id, actual = %current.status, "lost status race");
                LobbyError::InvalidState {
                    request: request_id,
                    actual: current.status,
                    expected,
                }
            }
            Err(e) => e,
        }
    }
}

fn require_status(request: &GameRequest, expected: RequestStatus) -> Result<(), LobbyError> {
    if request.status == expected {
        Ok(())
    } else {
        Err(LobbyError::InvalidState {
            request: request.id,
            actual: request.status,
            expected,
        })
    }
}

fn after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
