//! Reflex duel: best of five reaction rounds.
//!
//! ```text
//! Idle ──ready──→ GetReady ──go timer──→ Go ──tap / timeout──→ Resolved
//!                    │                                           │
//!                    └──tap (false start)──→ Resolved            │
//!                                                                ▼
//!                         GetReady ←──next-round timer── (end check) ──→ Settled
//! ```
//!
//! A round is credited at most once: whichever of false start, first tap,
//! or timeout happens first moves the phase to Resolved, and everything
//! after that in the same round is ignored.

use std::time::Duration;

use duelhall_protocol::{Event, GameVariant, RoundEvent, Scores, Seat};
use duelhall_timer::random_delay;
use tokio::time::Instant;

use crate::{Effect, MatchConfig, MatchError, Play, Rules, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the first ready.
    Idle,
    /// `get_ready` sent, `go` pending.
    GetReady,
    /// `go` sent at this instant.
    Go { at: Instant },
    /// Round credited, next round pending.
    Resolved,
    Settled,
}

pub struct ReflexRules {
    go_delay_min: Duration,
    go_delay_max: Duration,
    round_timeout: Duration,
    round_pause: Duration,
    max_rounds: u32,
    target: u32,
    phase: Phase,
    round: u32,
    scores: Scores,
}

impl ReflexRules {
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Settled
    }

    fn start_round(&mut self) -> Vec<Effect> {
        self.round += 1;
        self.phase = Phase::GetReady;
        let delay = random_delay(self.go_delay_min, self.go_delay_max);
        vec![
            Effect::Publish(Event::ReflexRound(RoundEvent::GetReady {
                round: self.round,
                scores: self.scores,
            })),
            Effect::Arm(TimerKind::Go { round: self.round }, delay),
        ]
    }

    /// Settles or schedules the next round.
    fn end_check(&mut self, effects: &mut Vec<Effect>) {
        if self.scores.leader() >= self.target || self.round >= self.max_rounds {
            self.phase = Phase::Settled;
            effects.push(Effect::Settle(self.scores));
        } else {
            effects.push(Effect::Arm(
                TimerKind::NextRound { round: self.round },
                self.round_pause,
            ));
        }
    }

    fn tap(&mut self, seat: Seat, now: Instant) -> Vec<Effect> {
        let round = self.round;
        let event = match self.phase {
            Phase::GetReady => {
                let credited = seat.other();
                self.scores.award(credited);
                tracing::debug!(round, by = %seat, "false start");
                RoundEvent::FalseStart {
                    round,
                    by: seat,
                    scores: self.scores,
                }
            }
            Phase::Go { at } => {
                self.scores.award(seat);
                let reaction = now.saturating_duration_since(at);
                RoundEvent::Won {
                    round,
                    by: seat,
                    reaction_ms: u64::try_from(reaction.as_millis()).unwrap_or(u64::MAX),
                    scores: self.scores,
                }
            }
            Phase::Idle | Phase::Resolved | Phase::Settled => {
                tracing::debug!(round, by = %seat, phase = ?self.phase, "tap ignored");
                return Vec::new();
            }
        };

        self.phase = Phase::Resolved;
        let mut effects = vec![Effect::CancelTimer, Effect::Publish(Event::ReflexRound(event))];
        self.end_check(&mut effects);
        effects
    }
}

impl Rules for ReflexRules {
    const VARIANT: GameVariant = GameVariant::Reflex;

    fn new(config: &MatchConfig) -> Self {
        Self {
            go_delay_min: config.go_delay_min,
            go_delay_max: config.go_delay_max,
            round_timeout: config.round_timeout,
            round_pause: config.round_pause,
            max_rounds: config.reflex_rounds,
            target: config.reflex_target,
            phase: Phase::Idle,
            round: 0,
            scores: Scores::default(),
        }
    }

    fn play(&mut self, seat: Seat, play: Play, now: Instant) -> Result<Vec<Effect>, MatchError> {
        match play {
            Play::Ready if self.phase == Phase::Idle => {
                tracing::debug!(by = %seat, "reflex started");
                Ok(self.start_round())
            }
            Play::Ready => Ok(Vec::new()),
            Play::Tap => Ok(self.tap(seat, now)),
            Play::Answer { .. } => {
                tracing::debug!(by = %seat, "answer sent to a reflex match");
                Ok(Vec::new())
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Vec<Effect> {
        if kind.round() != self.round {
            tracing::debug!(?kind, round = self.round, "stale timer discarded");
            return Vec::new();
        }

        match (kind, self.phase) {
            (TimerKind::Go { round }, Phase::GetReady) => {
                self.phase = Phase::Go { at: now };
                vec![
                    Effect::Publish(Event::ReflexRound(RoundEvent::Go { round })),
                    Effect::Arm(TimerKind::RoundTimeout { round }, self.round_timeout),
                ]
            }
            (TimerKind::RoundTimeout { round }, Phase::Go { .. }) => {
                self.phase = Phase::Resolved;
                let mut effects = vec![Effect::Publish(Event::ReflexRound(RoundEvent::Timeout {
                    round,
                }))];
                self.end_check(&mut effects);
                effects
            }
            (TimerKind::NextRound { .. }, Phase::Resolved) => self.start_round(),
            (kind, phase) => {
                tracing::debug!(?kind, ?phase, "timer does not apply to phase");
                Vec::new()
            }
        }
    }

    fn scores(&self) -> Scores {
        self.scores
    }
}

// =========================================================================
// Tests
// =========================================================================
