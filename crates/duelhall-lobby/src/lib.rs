//! The game request lifecycle for Duelhall.
//!
//! ```text
//! create ──→ PENDING ──accept──→ AWAIT_ADMIN ──approve──→ APPROVED
//!               │                    │  └───────deny────→ DENIED
//!               └──────expiry────────┴──────────────────→ EXPIRED
//! ```
//!
//! Every transition goes through the store's compare-and-set, so when two
//! callers race on one request exactly one wins and the other gets
//! `INVALID_STATE`. Each transition is announced on the venue channel.
//!
//! # Key types
//!
//! - [`RequestManager`]: create, accept, decide, expire, list
//! - [`QuotaGuard`]: the daily match limit checked before create
//! - [`LobbyConfig`]: TTLs, quota, sweep interval

mod config;
mod error;
mod manager;
mod quota;

pub use config::LobbyConfig;
pub use error::LobbyError;
pub use manager::{Decision, RequestManager};
pub use quota::QuotaGuard;
