//! The admin credential check.

use subtle::ConstantTimeEq;

use crate::SessionError;

/// Decides whether a connection may act as the venue admin.
pub trait AdminGate: Send + Sync + 'static {
    fn verify(&self, key: &str) -> Result<(), SessionError>;
}

/// A single shared admin key, compared in constant time.
#[derive(Clone)]
pub struct StaticAdminKey {
    key: Vec<u8>,
}

impl StaticAdminKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }
}

impl std::fmt::Debug for StaticAdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAdminKey").finish_non_exhaustive()
    }
}

impl AdminGate for StaticAdminKey {
    fn verify(&self, key: &str) -> Result<(), SessionError> {
        // An empty configured key locks everyone out.
        if self.key.is_empty() {
            return Err(SessionError::AdminRejected);
        }
        if bool::from(self.key.as_slice().ct_eq(key.as_bytes())) {
            Ok(())
        } else {
            tracing::warn!("admin credential rejected");
            Err(SessionError::AdminRejected)
        }
    }
}
