//! `goblin.toml` schema.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use goblin_core::{DEFAULT_MAX_OBJECT_SIZE, TtlPolicy};
use goblin_facade::GobSettings;
use goblin_store_redis::{RedisConfig, Transport};

/// Top-level configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoblinConfig {
    pub store: StoreConfig,
    pub gobs: GobsConfig,
    pub ttl: TtlPolicy,
    pub logging: LoggingConfig,
}

impl GoblinConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    ///
    /// Settings no upload could succeed under are rejected here.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Self = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            toml::from_str("")?
        };
        config.settings().validate()?;
        Ok(config)
    }

    /// Runtime-swappable settings handed to the facade.
    pub fn settings(&self) -> GobSettings {
        GobSettings {
            address: self.store.address.clone(),
            id_length: self.gobs.id_length,
            token_length: self.gobs.token_length,
            max_object_size: self.gobs.max_object_size,
            max_attempts: self.gobs.max_attempts,
            ttl: self.ttl,
        }
    }

    pub fn redis(&self) -> RedisConfig {
        RedisConfig {
            address: self.store.address.clone(),
            transport: self.store.transport,
            prefix: self.store.prefix.clone(),
            pool_size: self.store.pool_size,
            connect_timeout: Duration::from_millis(self.store.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.store.command_timeout_ms),
            sync_ttl: self.store.sync_ttl,
            limits: self.settings().limits(),
        }
    }
}

/// Configuration for the data store backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which backend to use: `"memory"` or `"redis"`.
    pub backend: String,

    /// `host:port`, or a socket path when `transport` is `"unix"`.
    pub address: String,

    pub transport: Transport,

    /// Key prefix for backends that support it.
    pub prefix: String,

    /// Idle connections kept by the pool. Zero disables reuse.
    pub pool_size: usize,

    pub connect_timeout_ms: u64,

    pub command_timeout_ms: u64,

    /// Arm gob lifetimes before returning rather than in the background.
    pub sync_ttl: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_owned(),
            address: "127.0.0.1:6379".to_owned(),
            transport: Transport::Tcp,
            prefix: "goblin".to_owned(),
            pool_size: 10,
            connect_timeout_ms: 5_000,
            command_timeout_ms: 5_000,
            sync_ttl: false,
        }
    }
}

/// Limits on issued gobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GobsConfig {
    pub id_length: usize,
    pub token_length: usize,
    pub max_object_size: u64,
    pub max_attempts: u32,
}

impl Default for GobsConfig {
    fn default() -> Self {
        Self {
            id_length: 6,
            token_length: 16,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: GoblinConfig = toml::from_str("").unwrap();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.store.transport, Transport::Tcp);
        assert_eq!(config.gobs.id_length, 6);
        assert_eq!(config.gobs.token_length, 16);
        assert_eq!(config.ttl, TtlPolicy::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.settings(), GobSettings::default());
    }

    #[test]
    fn full_file_parses() {
        let config: GoblinConfig = toml::from_str(
            r#"
            [store]
            backend = "redis"
            address = "/run/redis/redis.sock"
            transport = "unix"
            prefix = "paste"
            pool_size = 0
            command_timeout_ms = 250
            sync_ttl = true

            [gobs]
            id_length = 8
            token_length = 32
            max_object_size = 1048576

            [ttl]
            base_days = 100
            deleted_grace_days = 1

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, "redis");
        let redis = config.redis();
        assert_eq!(redis.transport, Transport::Unix);
        assert_eq!(redis.address, "/run/redis/redis.sock");
        assert_eq!(redis.prefix, "paste");
        assert_eq!(redis.pool_size, 0);
        assert_eq!(redis.command_timeout, Duration::from_millis(250));
        assert_eq!(redis.connect_timeout, Duration::from_secs(5));
        assert!(redis.sync_ttl);
        assert_eq!(redis.limits.max_object_size, 1_048_576);

        let settings = config.settings();
        assert_eq!(settings.id_length, 8);
        assert_eq!(settings.token_length, 32);
        assert_eq!(settings.max_attempts, 8);
        assert_eq!(settings.ttl.base_days, 100);
        assert_eq!(settings.ttl.small_object_days, 365);
        assert_eq!(settings.ttl.deleted_grace_days, 1);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let parsed: Result<GoblinConfig, _> = toml::from_str("[store]\ntransport = \"udp\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = GoblinConfig::load(Path::new("/nonexistent/goblin.toml")).unwrap();
        assert_eq!(config.store.backend, "memory");
    }

    #[test]
    fn zero_attempts_fail_to_load() {
        let path = std::env::temp_dir().join(format!("goblin-attempts-{}.toml", std::process::id()));
        std::fs::write(&path, "[gobs]\nmax_attempts = 0\n").unwrap();

        let err = GoblinConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));

        std::fs::remove_file(path).ok();
    }
}
