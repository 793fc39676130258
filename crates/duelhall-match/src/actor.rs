//! Match actor: an isolated Tokio task that owns one live match.

use std::time::Duration;

use duelhall_broadcast::Broadcaster;
use duelhall_protocol::{GameVariant, MatchId, MatchRecord, ParticipantId, Seat};
use duelhall_store::Store;
use duelhall_timer::Timer;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::{Effect, MatchEngine, MatchError, Play, Rules, TimerKind};

/// A player command on its way to the actor.
pub(crate) struct MatchCommand {
    pub seat: Seat,
    pub play: Play,
    pub reply: oneshot::Sender<Result<(), MatchError>>,
}

/// Handle to a running match actor, held by the engine's registry.
///
/// Cheap to clone: an `mpsc::Sender` plus the seating needed to resolve
/// participants without asking the actor.
#[derive(Clone)]
pub(crate) struct MatchHandle {
    pub match_id: MatchId,
    pub variant: GameVariant,
    pub p1: ParticipantId,
    pub p2: ParticipantId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn seat_of(&self, participant: ParticipantId) -> Option<Seat> {
        if participant == self.p1 {
            Some(Seat::P1)
        } else if participant == self.p2 {
            Some(Seat::P2)
        } else {
            None
        }
    }

    pub fn participant(&self, seat: Seat) -> ParticipantId {
        match seat {
            Seat::P1 => self.p1,
            Seat::P2 => self.p2,
        }
    }

    /// Sends a command and waits for the actor's acknowledgement.
    pub async fn send(&self, seat: Seat, play: Play) -> Result<(), MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(MatchCommand {
                seat,
                play,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))?;
        reply_rx
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))?
    }
}

struct MatchActor<R, S, B> {
    match_id: MatchId,
    rules: R,
    timer: Timer<TimerKind>,
    commands: mpsc::Receiver<MatchCommand>,
    engine: MatchEngine<S, B>,
    abandon_after: Duration,
}

impl<R: Rules, S: Store, B: Broadcaster> MatchActor<R, S, B> {
    /// Serves commands and timers until the match settles, the engine
    /// drops the handle, or no player has sent anything for
    /// `abandon_after`.
    ///
    /// Queued commands are served before timers, and [`Self::handle`]
    /// delivers any timer already due first, so the outcome depends only
    /// on instants, never on wake-up order.
    async fn run(mut self) {
        tracing::info!(match_id = %self.match_id, variant = %R::VARIANT, "match actor started");

        let idle = time::sleep(self.abandon_after);
        tokio::pin!(idle);

        loop {
            let settled = tokio::select! {
                biased;
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    idle.as_mut().reset(Instant::now() + self.abandon_after);
                    self.handle(cmd).await
                }
                kind = self.timer.fired() => {
                    tracing::debug!(match_id = %self.match_id, ?kind, "timer fired");
                    let effects = self.rules.on_timer(kind, Instant::now());
                    self.apply(effects).await
                }
                () = &mut idle => {
                    self.abandon().await;
                    true
                }
            };
            if settled {
                break;
            }
        }

        tracing::info!(match_id = %self.match_id, "match actor stopped");
    }

    async fn handle(&mut self, cmd: MatchCommand) -> bool {
        let now = Instant::now();
        if self.deliver_due(now).await {
            let _ = cmd.reply.send(Err(MatchError::NotFound(self.match_id)));
            return true;
        }

        match self.rules.play(cmd.seat, cmd.play, now) {
            Ok(effects) => {
                let settled = self.apply(effects).await;
                let _ = cmd.reply.send(Ok(()));
                settled
            }
            Err(e) => {
                tracing::debug!(match_id = %self.match_id, seat = %cmd.seat, error = %e, "command rejected");
                let _ = cmd.reply.send(Err(e));
                false
            }
        }
    }

    /// Applies timers whose deadline is not after `now`, each at its own
    /// deadline. Returns `true` if one of them settled the match.
    async fn deliver_due(&mut self, now: Instant) -> bool {
        while let Some((kind, deadline)) = self.timer.take_due(now) {
            tracing::debug!(match_id = %self.match_id, ?kind, "due timer delivered ahead of command");
            let effects = self.rules.on_timer(kind, deadline);
            if self.apply(effects).await {
                return true;
            }
        }
        false
    }

    async fn abandon(&mut self) {
        let scores = self.rules.scores();
        tracing::warn!(
            match_id = %self.match_id,
            idle_secs = self.abandon_after.as_secs(),
            p1 = scores.p1,
            p2 = scores.p2,
            "match abandoned, settling with current scores"
        );
        self.timer.cancel();
        self.engine.finish(self.match_id, scores).await;
    }

    /// Carries out effects in order. Returns `true` once the match settled.
    async fn apply(&mut self, effects: Vec<Effect>) -> bool {
        for effect in effects {
            match effect {
                Effect::Publish(event) => self.engine.publish(self.match_id, event),
                Effect::Arm(kind, after) => self.timer.arm(kind, after),
                Effect::CancelTimer => {
                    self.timer.cancel();
                }
                Effect::Settle(scores) => {
                    self.timer.cancel();
                    self.engine.finish(self.match_id, scores).await;
                    return true;
                }
            }
        }
        false
    }
}

/// Spawns the actor for `record` and returns its handle.
pub(crate) fn spawn_match<R: Rules, S: Store, B: Broadcaster>(
    record: &MatchRecord,
    engine: MatchEngine<S, B>,
    channel_size: usize,
) -> MatchHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let actor = MatchActor {
        match_id: record.id,
        rules: R::new(engine.config()),
        timer: Timer::new(),
        commands: rx,
        abandon_after: engine.config().abandon_after,
        engine,
    };
    tokio::spawn(actor.run());

    MatchHandle {
        match_id: record.id,
        variant: record.variant,
        p1: record.p1,
        p2: record.p2,
        sender: tx,
    }
}
