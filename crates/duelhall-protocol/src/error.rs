//! Error types for the protocol layer.
//!
//! Each crate in Duelhall defines its own error enum. [`ErrorCode`] is the
//! one shared piece: every crate-level error maps onto it so the gateway
//! can report failures to clients with a stable, machine-readable code.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Malformed JSON, missing fields, and unknown action or variant
    /// names all end up here.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded fine but breaks a protocol rule, e.g. a first
    /// frame that is not a handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Every protocol failure is a malformed-input problem.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Validation
    }
}

/// Stable error codes reported to the initiating caller.
///
/// The first five are the error taxonomy of the engine. `WrongVenue` and
/// `SelfAccept` are specific validation failures of `accept` that clients
/// render differently, and `Internal` covers storage faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or malformed input. Never retried.
    Validation,
    /// Unknown id.
    NotFound,
    /// The action is illegal in the current lifecycle or match state.
    /// Every race loser sees this.
    InvalidState,
    /// Policy rejection: the daily match quota is used up.
    QuotaExceeded,
    /// Failed trust check on a participant or admin credential.
    Unauthorized,
    /// The accepting table belongs to a different venue.
    WrongVenue,
    /// The accepting table is the originating table.
    SelfAccept,
    /// The storage collaborator failed.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::WrongVenue => "WRONG_VENUE",
            Self::SelfAccept => "SELF_ACCEPT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}
