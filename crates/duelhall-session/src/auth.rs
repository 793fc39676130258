//! Authentication hook for participant handshakes.

use duelhall_protocol::ParticipantId;

use crate::SessionError;

/// Resolves a handshake token into a verified participant.
///
/// # Example
///
/// ```rust
/// use duelhall_protocol::ParticipantId;
/// use duelhall_session::{Authenticator, SessionError};
///
/// /// Lets one fixed token in.
/// struct SingleGuest;
///
/// impl Authenticator for SingleGuest {
///     async fn authenticate(&self, token: &str) -> Result<ParticipantId, SessionError> {
///         if token == "guest" {
///             Ok(ParticipantId(1))
///         } else {
///             Err(SessionError::AuthFailed("unknown guest".into()))
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<ParticipantId, SessionError>> + Send;
}

/// Treats the token as the participant number. Development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericTokenAuthenticator;

impl Authenticator for NumericTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<ParticipantId, SessionError> {
        match token.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(ParticipantId(id)),
            _ => Err(SessionError::AuthFailed(
                "token must be a positive number".into(),
            )),
        }
    }
}
