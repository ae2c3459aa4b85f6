use std::sync::Arc;

use goblin_store::DataStore;
use goblin_store_memory::MemoryDataStore;
use goblin_store_redis::RedisDataStore;

use crate::config::GoblinConfig;

/// Create the data store backend named in `[store] backend`.
pub fn create_store(config: &GoblinConfig) -> anyhow::Result<Arc<dyn DataStore>> {
    let store: Arc<dyn DataStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(MemoryDataStore::with_limits(config.settings().limits())),
        "redis" => Arc::new(RedisDataStore::new(&config.redis())),
        other => anyhow::bail!("unknown store backend: {other} (expected \"memory\" or \"redis\")"),
    };
    tracing::info!(backend = %config.store.backend, "data store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_by_default() {
        let config = GoblinConfig::default();
        let store = create_store(&config).unwrap();
        assert!(!store.id_exists("anything").await.unwrap());
    }

    #[tokio::test]
    async fn redis_backend_builds_without_connecting() {
        let config: GoblinConfig = toml::from_str("[store]\nbackend = \"redis\"\n").unwrap();
        assert!(create_store(&config).is_ok());
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let config: GoblinConfig = toml::from_str("[store]\nbackend = \"gcs\"\n").unwrap();
        let err = create_store(&config).err().expect("should fail");
        assert!(err.to_string().contains("gcs"));
    }
}
