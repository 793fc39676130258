//! Lobby configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// How long a request stays open for another table to accept.
    pub request_ttl: Duration,
    /// How long an accepted request waits for the admin.
    pub admin_ttl: Duration,
    /// Matches a participant may play per UTC day.
    pub daily_quota: u32,
    /// Period of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Cap on the admin console listing.
    pub admin_list_limit: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::from_secs(120),
            admin_ttl: Duration::from_secs(60),
            daily_quota: 10,
            sweep_interval: Duration::from_secs(5),
            admin_list_limit: 50,
        }
    }
}
