//! Server configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use duelhall_lobby::LobbyConfig;
use duelhall_match::MatchConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the venue server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket gateway listens on.
    pub bind: String,
    /// Shared admin credential (required).
    pub admin_key: String,
    pub lobby: LobbyConfig,
    pub matches: MatchConfig,
    /// Connections that send nothing for this long are closed.
    pub idle_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}: {hint}")]
    MissingRequired { var: &'static str, hint: &'static str },

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ServerConfig {
    /// Reads the `DUELHALL_*` variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `DUELHALL_BIND` | `127.0.0.1:8080` |
    /// | `DUELHALL_ADMIN_KEY` | required |
    /// | `DUELHALL_REQUEST_TTL_SECS` | 120 |
    /// | `DUELHALL_ADMIN_TTL_SECS` | 60 |
    /// | `DUELHALL_DAILY_QUOTA` | 10 |
    /// | `DUELHALL_IDLE_TIMEOUT_SECS` | 30 |
    ///
    /// # Errors
    /// [`ConfigError`] if the admin key is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("DUELHALL_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());

        let admin_key = lookup("DUELHALL_ADMIN_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingRequired {
                var: "DUELHALL_ADMIN_KEY",
                hint: "the key the venue admin console sends in AdminHello",
            })?;

        let defaults = LobbyConfig::default();
        let lobby = LobbyConfig {
            request_ttl: secs_or(&lookup, "DUELHALL_REQUEST_TTL_SECS", defaults.request_ttl)?,
            admin_ttl: secs_or(&lookup, "DUELHALL_ADMIN_TTL_SECS", defaults.admin_ttl)?,
            daily_quota: parse_or(&lookup, "DUELHALL_DAILY_QUOTA", defaults.daily_quota)?,
            ..defaults
        };

        let idle_timeout = secs_or(&lookup, "DUELHALL_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT)?;
        if idle_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "DUELHALL_IDLE_TIMEOUT_SECS",
                reason: "must be greater than 0".into(),
            });
        }

        Ok(Self {
            bind,
            admin_key,
            lobby,
            matches: MatchConfig::default(),
            idle_timeout,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, var, default.as_secs()).map(Duration::from_secs)
}
