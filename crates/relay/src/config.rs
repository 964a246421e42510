use std::net::SocketAddr;
use std::time::Duration;

use groupcart_infra::config::{ConfigError, env_lookup, parse_or};

/// Relay server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `GROUPCART_BIND_ADDR`.
    pub bind_addr: SocketAddr,
    /// Per-room broadcast buffer (`GROUPCART_ROOM_CAPACITY`). Subscribers
    /// that fall further behind skip ahead and must resync.
    pub room_capacity: usize,
    /// How long an ordered room stays readable once nobody streams it
    /// (`GROUPCART_ORDERED_ROOM_TTL_SECS`).
    pub ordered_room_ttl: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            room_capacity: 256,
            ordered_room_ttl: Duration::from_secs(600),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let bind_addr = parse_or(&lookup, "GROUPCART_BIND_ADDR", defaults.bind_addr)?;
        let room_capacity = parse_or(&lookup, "GROUPCART_ROOM_CAPACITY", defaults.room_capacity)?;
        if room_capacity == 0 {
            return Err(ConfigError::invalid(
                "GROUPCART_ROOM_CAPACITY",
                "0",
                "must be positive",
            ));
        }

        let ttl_secs = parse_or(
            &lookup,
            "GROUPCART_ORDERED_ROOM_TTL_SECS",
            defaults.ordered_room_ttl.as_secs(),
        )?;
        if ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "GROUPCART_ORDERED_ROOM_TTL_SECS",
                "0",
                "must be positive",
            ));
        }

        Ok(Self {
            bind_addr,
            room_capacity,
            ordered_room_ttl: Duration::from_secs(ttl_secs),
        })
    }
}
