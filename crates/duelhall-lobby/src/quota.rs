//! Daily match limit.

use std::sync::Arc;

use duelhall_protocol::ParticipantId;
use duelhall_store::Store;

use crate::LobbyError;

/// Refuses new requests from participants who already played their
/// daily share of matches.
pub struct QuotaGuard<S> {
    store: Arc<S>,
    daily_quota: u32,
}

impl<S: Store> QuotaGuard<S> {
    pub fn new(store: Arc<S>, daily_quota: u32) -> Self {
        Self { store, daily_quota }
    }

    /// Fails with [`LobbyError::QuotaExceeded`] once the participant has
    /// `daily_quota` matches today.
    pub async fn check(&self, participant: ParticipantId) -> Result<(), LobbyError> {
        let played = self.store.count_matches_today(participant).await?;
        if played >= self.daily_quota {
            tracing::info!(%participant, played, quota = self.daily_quota, "daily quota reached");
            return Err(LobbyError::QuotaExceeded {
                participant,
                played,
                quota: self.daily_quota,
            });
        }
        Ok(())
    }

    pub fn daily_quota(&self) -> u32 {
        self.daily_quota
    }
}
