//! Match engine: the registry of live matches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use duelhall_broadcast::Broadcaster;
use duelhall_protocol::{
    Channel, Event, GameVariant, MatchId, MatchRecord, MatchResult, ParticipantId, Scores,
};
use duelhall_store::{Settlement, Store};

use crate::actor::{MatchHandle, spawn_match};
use crate::{MatchConfig, MatchError, Play, QuizRules, ReflexRules};

/// Command channel size per match actor.
const CHANNEL_SIZE: usize = 64;

struct Inner<S, B> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    config: MatchConfig,
    /// Presence here means "live". Never locked across an `.await`.
    live: Mutex<HashMap<MatchId, MatchHandle>>,
}

/// Launches match actors, routes player commands to them, and settles
/// matches exactly once.
///
/// Cloning is cheap and every clone shares the same registry.
pub struct MatchEngine<S, B> {
    inner: Arc<Inner<S, B>>,
}

impl<S, B> Clone for MatchEngine<S, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, B: Broadcaster> MatchEngine<S, B> {
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, config: MatchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                broadcaster,
                config,
                live: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.inner.config
    }

    fn live(&self) -> MutexGuard<'_, HashMap<MatchId, MatchHandle>> {
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the actor for an approved match and publishes
    /// `match.started` on its channel.
    ///
    /// # Errors
    /// - [`MatchError::AlreadyLive`] if the id is already running
    /// - [`MatchError::AlreadySettled`] for a record that has ended
    pub fn launch(&self, record: &MatchRecord) -> Result<(), MatchError> {
        if record.is_settled() {
            return Err(MatchError::AlreadySettled(record.id));
        }

        let mut live = self.live();
        if live.contains_key(&record.id) {
            return Err(MatchError::AlreadyLive(record.id));
        }

        let handle = match record.variant {
            GameVariant::Reflex => spawn_match::<ReflexRules, S, B>(record, self.clone(), CHANNEL_SIZE),
            GameVariant::Quiz => spawn_match::<QuizRules, S, B>(record, self.clone(), CHANNEL_SIZE),
        };
        live.insert(record.id, handle);

        // Published under the registry lock: no command can reach the
        // actor before `match.started` is out.
        self.publish(
            record.id,
            Event::MatchStarted {
                record: record.clone(),
            },
        );
        tracing::info!(
            match_id = %record.id,
            variant = %record.variant,
            p1 = %record.p1,
            p2 = %record.p2,
            "match launched"
        );
        Ok(())
    }

    pub fn is_live(&self, match_id: MatchId) -> bool {
        self.live().contains_key(&match_id)
    }

    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    pub async fn reflex_ready(&self, match_id: MatchId, participant: ParticipantId) -> Result<(), MatchError> {
        self.dispatch(match_id, participant, GameVariant::Reflex, Play::Ready).await
    }

    pub async fn reflex_tap(&self, match_id: MatchId, participant: ParticipantId) -> Result<(), MatchError> {
        self.dispatch(match_id, participant, GameVariant::Reflex, Play::Tap).await
    }

    pub async fn quiz_ready(&self, match_id: MatchId, participant: ParticipantId) -> Result<(), MatchError> {
        self.dispatch(match_id, participant, GameVariant::Quiz, Play::Ready).await
    }

    pub async fn quiz_answer(
        &self,
        match_id: MatchId,
        participant: ParticipantId,
        index: usize,
        value: i64,
    ) -> Result<(), MatchError> {
        self.dispatch(
            match_id,
            participant,
            GameVariant::Quiz,
            Play::Answer { index, value },
        )
        .await
    }

    /// Resolves the seat and hands the command to the actor.
    async fn dispatch(
        &self,
        match_id: MatchId,
        participant: ParticipantId,
        variant: GameVariant,
        play: Play,
    ) -> Result<(), MatchError> {
        let handle = self.live().get(&match_id).cloned();
        let handle = handle.ok_or(MatchError::NotFound(match_id))?;

        let seat = handle.seat_of(participant).ok_or(MatchError::NotParticipant {
            match_id,
            participant,
        })?;
        if handle.variant != variant {
            return Err(MatchError::WrongVariant {
                match_id,
                actual: handle.variant,
                requested: variant,
            });
        }

        handle.send(seat, play).await
    }

    /// Settles a match. Idempotent: only the call that removes the match
    /// from the registry persists the outcome and publishes
    /// `match.ended`; every other call returns `false`.
    ///
    /// Persistence failures are logged and do not stop `match.ended`
    /// from going out.
    pub async fn finish(&self, match_id: MatchId, scores: Scores) -> bool {
        let removed = self.live().remove(&match_id);
        let Some(handle) = removed else {
            tracing::debug!(%match_id, "finish on a match that is not live");
            return false;
        };

        let result = MatchResult::from_scores(&scores);
        let settlement = Settlement {
            ended_at: Utc::now(),
            result,
            scores,
            winner: result.winner().map(|seat| handle.participant(seat)),
        };
        self.persist(match_id, settlement).await;

        tracing::info!(%match_id, %result, p1 = scores.p1, p2 = scores.p2, "match settled");
        self.publish(
            match_id,
            Event::MatchEnded {
                match_id,
                result,
                scores,
            },
        );
        true
    }

    /// Writes the settlement with bounded retries.
    async fn persist(&self, match_id: MatchId, settlement: Settlement) {
        let attempts = self.inner.config.settle_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .inner
                .store
                .update_match_settlement(match_id, settlement.clone())
                .await
            {
                Ok(true) => return,
                Ok(false) => {
                    tracing::warn!(%match_id, "store already had a settlement");
                    return;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(%match_id, attempt, error = %e, "settlement write failed, retrying");
                    tokio::time::sleep(self.inner.config.settle_backoff).await;
                }
                Err(e) => {
                    tracing::error!(%match_id, attempts, error = %e, "settlement write failed, giving up");
                }
            }
        }
    }

    pub(crate) fn publish(&self, match_id: MatchId, event: Event) {
        self.inner
            .broadcaster
            .publish(Channel::Match(match_id), event);
    }
}
