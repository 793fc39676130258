//! The [`Rules`] trait: what a game variant has to implement.
//!
//! Rules are plain state machines. They never touch channels, clocks, or
//! storage; they return [`Effect`]s and the actor carries them out. That
//! keeps every variant testable without a runtime.

use std::time::Duration;

use duelhall_protocol::{Event, GameVariant, Scores, Seat};
use tokio::time::Instant;

use crate::{MatchConfig, MatchError};

/// A player command, already resolved to a seat by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Play {
    Ready,
    Tap,
    Answer { index: usize, value: i64 },
}

/// Timers a match can arm. Each carries the round it belongs to so a
/// timer that outlived its round is recognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Random delay before `go`.
    Go { round: u32 },
    /// Nobody tapped in time.
    RoundTimeout { round: u32 },
    /// Pause after a resolved round.
    NextRound { round: u32 },
}

impl TimerKind {
    pub fn round(self) -> u32 {
        match self {
            Self::Go { round } | Self::RoundTimeout { round } | Self::NextRound { round } => round,
        }
    }
}

/// Something the actor must do after a rules step, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish on the match channel.
    Publish(Event),
    /// Arm the match timer, replacing any pending one.
    Arm(TimerKind, Duration),
    CancelTimer,
    /// The match is over with these scores.
    Settle(Scores),
}

/// A game variant's state machine.
pub trait Rules: Send + 'static {
    const VARIANT: GameVariant;

    fn new(config: &MatchConfig) -> Self;

    /// Applies a player command.
    ///
    /// Commands that are legal but meaningless right now (a tap between
    /// rounds, a repeated answer) return `Ok` with no effects.
    fn play(&mut self, seat: Seat, play: Play, now: Instant) -> Result<Vec<Effect>, MatchError>;

    /// Reacts to an expired timer. Variants without timers keep the
    /// default.
    fn on_timer(&mut self, _kind: TimerKind, _now: Instant) -> Vec<Effect> {
        Vec::new()
    }

    /// Current scores.
    fn scores(&self) -> Scores;
}
