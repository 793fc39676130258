//! Live matches for Duelhall.
//!
//! Each approved match runs as an isolated Tokio task (actor) that owns
//! the variant's rules state and a single-slot timer. Player commands
//! reach the actor through its mpsc channel, so one match applies its
//! commands in arrival order while different matches run independently.
//!
//! # Key types
//!
//! - [`MatchEngine`]: registry of live matches, command routing, settlement
//! - [`Rules`]: the per-variant state machine an actor drives
//! - [`ReflexRules`] / [`QuizRules`]: the two variants
//! - [`MatchConfig`]: delays, round limits, settlement retry policy

mod actor;
mod config;
mod engine;
mod error;
mod quiz;
mod reflex;
mod rules;

pub use config::MatchConfig;
pub use engine::MatchEngine;
pub use error::MatchError;
pub use quiz::{QuizRules, generate_questions};
pub use reflex::ReflexRules;
pub use rules::{Effect, Play, Rules, TimerKind};
