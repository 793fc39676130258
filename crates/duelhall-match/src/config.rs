//! Match configuration.

use std::time::Duration;

/// Tunables for live matches. The defaults are the venue rules.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Lower bound of the random wait between `get_ready` and `go`.
    pub go_delay_min: Duration,
    /// Upper bound (exclusive) of that wait.
    pub go_delay_max: Duration,
    /// How long players have to tap after `go`.
    pub round_timeout: Duration,
    /// Pause between a resolved round and the next `get_ready`.
    pub round_pause: Duration,
    /// Reflex ends after this many rounds...
    pub reflex_rounds: u32,
    /// ...or as soon as one seat has this many round wins.
    pub reflex_target: u32,
    pub quiz_questions: usize,
    /// Attempts at writing the settlement before giving up.
    pub settle_attempts: u32,
    pub settle_backoff: Duration,
    /// A live match with no player command for this long is settled with
    /// its current scores and leaves the registry.
    pub abandon_after: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            go_delay_min: Duration::from_millis(1000),
            go_delay_max: Duration::from_millis(4000),
            round_timeout: Duration::from_millis(2000),
            round_pause: Duration::from_millis(800),
            reflex_rounds: 5,
            reflex_target: 3,
            quiz_questions: 5,
            settle_attempts: 3,
            settle_backoff: Duration::from_millis(50),
            abandon_after: Duration::from_secs(600),
        }
    }
}
