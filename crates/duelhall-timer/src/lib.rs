//! Single-slot one-shot timer for match actors.
//!
//! A match has at most one pending timer at any moment: the delay before
//! `go`, the round timeout, or the pause before the next round. Arming a
//! new timer replaces the old one and cancelling clears the slot, so a
//! superseded timer can never fire.
//!
//! # Integration
//!
//! The timer sits inside an actor's `tokio::select!` loop next to the
//! command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* may arm or cancel */ }
//!         kind = timer.fired() => { /* react to the expired timer */ }
//!     }
//! }
//! ```
//!
//! When nothing is armed, [`Timer::fired`] pends forever and `select!`
//! keeps serving the other branches.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::trace;

/// Counters kept by a [`Timer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Timers armed, including ones that replaced a pending timer.
    pub armed: u64,
    /// Timers that expired and were delivered.
    pub fired: u64,
    /// Pending timers dropped by [`Timer::cancel`].
    pub cancelled: u64,
    /// Pending timers dropped because a new one was armed over them.
    pub replaced: u64,
}

/// A slot holding at most one pending timer of kind `K`.
#[derive(Debug)]
pub struct Timer<K> {
    slot: Option<(K, Instant)>,
    stats: TimerStats,
}

impl<K> Default for Timer<K> {
    fn default() -> Self {
        Self {
            slot: None,
            stats: TimerStats::default(),
        }
    }
}

impl<K: std::fmt::Debug> Timer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind` to fire after `after`, replacing any pending timer.
    pub fn arm(&mut self, kind: K, after: Duration) {
        if let Some((old, _)) = self.slot.take() {
            trace!(replaced = ?old, "pending timer replaced");
            self.stats.replaced += 1;
        }
        trace!(?kind, after_ms = after.as_millis() as u64, "timer armed");
        self.slot = Some((kind, Instant::now() + after));
        self.stats.armed += 1;
    }

    /// Clears the slot. Returns the kind that was pending, if any.
    pub fn cancel(&mut self) -> Option<K> {
        let (kind, _) = self.slot.take()?;
        trace!(?kind, "timer cancelled");
        self.stats.cancelled += 1;
        Some(kind)
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    /// The pending kind, if any.
    pub fn pending(&self) -> Option<&K> {
        self.slot.as_ref().map(|(kind, _)| kind)
    }

    /// Time left until the pending timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.slot
            .as_ref()
            .map(|(_, deadline)| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    /// Takes the pending timer if its deadline is at or before `now`,
    /// returning its kind and deadline.
    ///
    /// Lets an actor deliver a timer that is already due before a command
    /// observed at `now`, whatever order the runtime woke them in.
    pub fn take_due(&mut self, now: Instant) -> Option<(K, Instant)> {
        match self.slot {
            Some((_, deadline)) if deadline <= now => {
                let (kind, deadline) = self.slot.take()?;
                trace!(?kind, "due timer taken");
                self.stats.fired += 1;
                Some((kind, deadline))
            }
            _ => None,
        }
    }

    /// Waits for the pending timer and returns its kind, clearing the slot.
    ///
    /// Pends forever while nothing is armed. Cancel-safe: dropping the
    /// future before it completes leaves the slot untouched.
    pub async fn fired(&mut self) -> K {
        let Some(deadline) = self.slot.as_ref().map(|(_, deadline)| *deadline) else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        match self.slot.take() {
            Some((kind, _)) => {
                trace!(?kind, "timer fired");
                self.stats.fired += 1;
                kind
            }
            None => std::future::pending().await,
        }
    }
}

/// A uniformly random delay in `[min, max)`. Returns `min` when the range
/// is empty.
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(rand::rng().random_range(min_ms..max_ms))
}
