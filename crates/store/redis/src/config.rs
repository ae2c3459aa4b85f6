use std::time::Duration;

use goblin_core::StoreLimits;

use crate::pool::Transport;

/// Configuration for the Redis data store backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Backend address, `host:port` for TCP or a socket path for Unix.
    pub address: String,

    /// How to reach `address`.
    pub transport: Transport,

    /// Key prefix applied to every Redis key to avoid collisions.
    pub prefix: String,

    /// Maximum number of idle connections kept by the pool. Zero disables
    /// reuse.
    pub pool_size: usize,

    /// Timeout for dialing a new connection.
    pub connect_timeout: Duration,

    /// Timeout for a single command or pipeline round trip.
    pub command_timeout: Duration,

    /// Arm TTLs before returning instead of in a background task.
    pub sync_ttl: bool,

    /// Size limit and TTL policy applied at startup.
    pub limits: StoreLimits,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:6379"),
            transport: Transport::Tcp,
            prefix: String::from("goblin"),
            pool_size: 10,
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            sync_ttl: false,
            limits: StoreLimits::default(),
        }
    }
}
