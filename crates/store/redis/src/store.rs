use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue, Pipeline, RedisResult, Script, ScriptInvocation};
use tracing::{debug, info, warn};

use goblin_core::{Gob, GobMetadata, HordeEntry, StoreLimits, decode_metadata, encode_metadata};
use goblin_store::{DataStore, GobKey, StoreError};

use crate::config::RedisConfig;
use crate::key_render::{render_deleted_key, render_key};
use crate::pool::{Endpoint, Pool, PoolError, PooledConnection, RedisConnector};
use crate::scripts;

fn pool_error(e: PoolError) -> StoreError {
    match e {
        PoolError::Timeout(d) => StoreError::Timeout(d),
        other => StoreError::Connection(other.to_string()),
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

/// Borrow-run-return around the pool, with every round trip bounded by the
/// command timeout. Connections that saw an error are dropped, not returned.
#[derive(Clone)]
struct Link {
    pool: Arc<Pool<RedisConnector>>,
    timeout: Duration,
}

impl Link {
    async fn conn(&self) -> Result<PooledConnection<MultiplexedConnection>, StoreError> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, StoreError> {
        let mut conn = self.conn().await?;
        let value = self.bounded(cmd.query_async(&mut *conn)).await?;
        self.pool.put(conn);
        Ok(value)
    }

    async fn pipe<T: FromRedisValue>(&self, pipe: &Pipeline) -> Result<T, StoreError> {
        let mut conn = self.conn().await?;
        let value = self.bounded(pipe.query_async(&mut *conn)).await?;
        self.pool.put(conn);
        Ok(value)
    }

    async fn invoke<T: FromRedisValue>(
        &self,
        invocation: &ScriptInvocation<'_>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn().await?;
        let value = self.bounded(invocation.invoke_async(&mut *conn)).await?;
        self.pool.put(conn);
        Ok(value)
    }
}

/// Redis-backed implementation of [`DataStore`].
///
/// Keys are rendered as `prefix:kind:id`; soft-deleted keys live under
/// `prefix:deleted:kind:id`. Payloads and tokens are plain strings, metadata
/// is JSON, horde lists are Redis lists and horde timestamps a hash of
/// RFC 3339 strings.
///
/// Unless [`RedisConfig::sync_ttl`] is set, lifetimes after `put_blob`,
/// `append_blob` and `get_blob` are armed by a spawned task after the call
/// returns. A failure there is logged and never reaches the caller.
pub struct RedisDataStore {
    link: Link,
    prefix: String,
    sync_ttl: bool,
    limits: RwLock<StoreLimits>,
}

impl RedisDataStore {
    /// Create a new `RedisDataStore` from the provided configuration.
    ///
    /// No connection is made until the first operation. Must be called from
    /// within a Tokio runtime.
    pub fn new(config: &RedisConfig) -> Self {
        let pool = Pool::new(
            RedisConnector,
            Endpoint::new(config.transport, config.address.clone()),
            config.pool_size,
            config.connect_timeout,
        );
        Self {
            link: Link {
                pool: Arc::new(pool),
                timeout: config.command_timeout,
            },
            prefix: config.prefix.clone(),
            sync_ttl: config.sync_ttl,
            limits: RwLock::new(config.limits),
        }
    }

    fn key(&self, key: &GobKey) -> String {
        render_key(&self.prefix, key)
    }

    fn deleted_key(&self, key: &GobKey) -> String {
        render_deleted_key(&self.prefix, key)
    }

    /// Payload, metadata and token keys of one gob.
    fn gob_keys(&self, id: &str, token: &str) -> [GobKey; 3] {
        [GobKey::data(id), GobKey::meta(id), GobKey::token(token)]
    }

    /// Keys that share the lifetime of a gob: its own three plus the horde
    /// link.
    fn lifetime_keys(&self, id: &str, token: &str) -> [GobKey; 4] {
        let [data, meta, token] = self.gob_keys(id, token);
        [data, meta, token, GobKey::id_horde(id)]
    }

    fn expire_pipeline(&self, keys: &[GobKey], ttl: Duration) -> Pipeline {
        let secs = ttl_secs(ttl);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.expire(self.key(key), secs).ignore();
        }
        pipe
    }

    /// Give the keys of a gob the lifetime for a payload of `size` bytes.
    async fn arm_ttl(&self, id: &str, token: &str, size: u64) -> Result<(), StoreError> {
        let ttl = self.limits().ttl.ttl_for(size);
        let pipe = self.expire_pipeline(&self.lifetime_keys(id, token), ttl);
        if self.sync_ttl {
            return self.link.pipe::<()>(&pipe).await;
        }

        let link = self.link.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            if let Err(e) = link.pipe::<()>(&pipe).await {
                warn!(id = %id, error = %e, "failed to arm gob TTL");
            }
        });
        Ok(())
    }

    async fn read_metadata(&self, key: String) -> Result<Option<GobMetadata>, StoreError> {
        let raw: Option<Vec<u8>> = self.link.query(redis::cmd("GET").arg(key)).await?;
        raw.map(|raw| decode_metadata(&raw))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn read_gob(&self, data_key: String, meta_key: String) -> Result<Option<Gob>, StoreError> {
        let (data, meta): (Option<Vec<u8>>, Option<Vec<u8>>) = self
            .link
            .query(redis::cmd("MGET").arg(data_key).arg(meta_key))
            .await?;
        let (Some(data), Some(meta)) = (data, meta) else {
            return Ok(None);
        };
        let metadata = decode_metadata(&meta)?;
        Ok(Some(Gob {
            metadata,
            data: Bytes::from(data),
        }))
    }

    fn soft_delete_invocation<'a>(
        &self,
        script: &'a Script,
        keys: &[GobKey],
    ) -> ScriptInvocation<'a> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(self.key(key)).key(self.deleted_key(key));
        }
        invocation.arg(ttl_secs(self.limits().ttl.deleted_grace()));
        invocation
    }
}

#[async_trait]
impl DataStore for RedisDataStore {
    async fn id_exists(&self, id: &str) -> Result<bool, StoreError> {
        self.link
            .query(redis::cmd("EXISTS").arg(self.key(&GobKey::data(id))))
            .await
    }

    async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
        self.link
            .query(redis::cmd("EXISTS").arg(self.key(&GobKey::token(token))))
            .await
    }

    async fn put_blob(&self, data: Bytes, metadata: &GobMetadata) -> Result<bool, StoreError> {
        let encoded = encode_metadata(metadata)?;
        let [data_key, meta_key, token_key] = self.gob_keys(&metadata.id, &metadata.token);

        let mut cmd = redis::cmd("MSETNX");
        cmd.arg(self.key(&data_key))
            .arg(data.as_ref())
            .arg(self.key(&meta_key))
            .arg(encoded)
            .arg(self.key(&token_key))
            .arg(&metadata.id);
        let written: bool = self.link.query(&cmd).await?;
        if !written {
            debug!(id = %metadata.id, "refusing put over live id or token");
            return Ok(false);
        }

        self.arm_ttl(&metadata.id, &metadata.token, data.len() as u64)
            .await?;
        Ok(true)
    }

    async fn append_blob(&self, id: &str, chunk: &[u8]) -> Result<Option<u64>, StoreError> {
        let Some(metadata) = self.read_metadata(self.key(&GobKey::meta(id))).await? else {
            return Ok(None);
        };

        let script = Script::new(scripts::APPEND_BOUNDED);
        let mut invocation = script.key(self.key(&GobKey::data(id)));
        invocation.arg(chunk).arg(self.limits().max_object_size);
        let len: i64 = self.link.invoke(&invocation).await?;
        let Ok(len) = u64::try_from(len) else {
            return Ok(None);
        };

        self.arm_ttl(id, &metadata.token, len).await?;
        Ok(Some(len))
    }

    async fn get_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
        let gob = self
            .read_gob(self.key(&GobKey::data(id)), self.key(&GobKey::meta(id)))
            .await?;
        if let Some(gob) = &gob {
            self.arm_ttl(id, &gob.metadata.token, gob.len() as u64)
                .await?;
        }
        Ok(gob)
    }

    async fn get_blob_len(&self, id: &str) -> Result<Option<u64>, StoreError> {
        let key = self.key(&GobKey::data(id));
        let mut pipe = redis::pipe();
        pipe.exists(&key).strlen(&key);
        let (exists, len): (bool, u64) = self.link.pipe(&pipe).await?;
        Ok(exists.then_some(len))
    }

    async fn blob_ttl(&self, id: &str) -> Result<Option<Duration>, StoreError> {
        let secs: i64 = self
            .link
            .query(redis::cmd("TTL").arg(self.key(&GobKey::data(id))))
            .await?;
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }

    async fn delete_blob(&self, id: &str) -> Result<bool, StoreError> {
        let Some(metadata) = self.read_metadata(self.key(&GobKey::meta(id))).await? else {
            return Ok(false);
        };

        let script = Script::new(scripts::SOFT_DELETE);
        let invocation = self.soft_delete_invocation(&script, &self.gob_keys(id, &metadata.token));
        let moved: i64 = self.link.invoke(&invocation).await?;
        debug!(id, moved, "soft-deleted gob");
        Ok(moved > 0)
    }

    async fn get_deleted_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
        self.read_gob(
            self.deleted_key(&GobKey::data(id)),
            self.deleted_key(&GobKey::meta(id)),
        )
        .await
    }

    async fn restore_blob(&self, id: &str) -> Result<bool, StoreError> {
        let Some(metadata) = self
            .read_metadata(self.deleted_key(&GobKey::meta(id)))
            .await?
        else {
            return Ok(false);
        };
        let keys = self.gob_keys(id, &metadata.token);

        let script = Script::new(scripts::RESTORE);
        let mut invocation = script.prepare_invoke();
        for key in &keys {
            invocation.key(self.key(key));
        }
        for key in &keys {
            invocation.key(self.deleted_key(key));
        }
        let len: i64 = self.link.invoke(&invocation).await?;
        let Ok(len) = u64::try_from(len) else {
            debug!(id, "nothing to restore or live key in the way");
            return Ok(false);
        };

        // Always synchronous: until this lands the keys still carry the
        // grace TTL.
        let ttl = self.limits().ttl.ttl_for(len);
        self.link
            .pipe::<()>(&self.expire_pipeline(&self.lifetime_keys(id, &metadata.token), ttl))
            .await?;
        info!(id, "restored gob");
        Ok(true)
    }

    async fn token_to_id(&self, token: &str) -> Result<Option<String>, StoreError> {
        self.link
            .query(redis::cmd("GET").arg(self.key(&GobKey::token(token))))
            .await
    }

    async fn add_to_horde(&self, horde: &str, id: &str) -> Result<(), StoreError> {
        let script = Script::new(scripts::ADD_TO_HORDE);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(self.key(&GobKey::horde_list(horde)))
            .key(self.key(&GobKey::horde_times(horde)))
            .key(self.key(&GobKey::id_horde(id)))
            .key(self.key(&GobKey::data(id)))
            .arg(id)
            .arg(horde)
            .arg(Utc::now().to_rfc3339());
        let _: i64 = self.link.invoke(&invocation).await?;
        Ok(())
    }

    async fn remove_from_horde(&self, id: &str) -> Result<bool, StoreError> {
        let id_horde = GobKey::id_horde(id);
        let horde: Option<String> = self
            .link
            .query(redis::cmd("GET").arg(self.key(&id_horde)))
            .await?;
        let Some(horde) = horde else {
            return Ok(false);
        };

        let mut pipe = redis::pipe();
        pipe.atomic()
            .lrem(self.key(&GobKey::horde_list(&horde)), 1, id)
            .ignore()
            .hdel(self.key(&GobKey::horde_times(&horde)), id)
            .ignore();
        self.link.pipe::<()>(&pipe).await?;

        let script = Script::new(scripts::SOFT_DELETE);
        let invocation = self.soft_delete_invocation(&script, &[id_horde]);
        let _: i64 = self.link.invoke(&invocation).await?;
        Ok(true)
    }

    async fn get_horde(&self, horde: &str) -> Result<Vec<HordeEntry>, StoreError> {
        let mut pipe = redis::pipe();
        pipe.lrange(self.key(&GobKey::horde_list(horde)), 0, -1)
            .hgetall(self.key(&GobKey::horde_times(horde)));
        let (ids, stamps): (Vec<String>, HashMap<String, String>) =
            self.link.pipe(&pipe).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Ids whose link expired or now names another horde are skipped.
        let mut mget = redis::cmd("MGET");
        for id in &ids {
            mget.arg(self.key(&GobKey::id_horde(id)));
        }
        let owners: Vec<Option<String>> = self.link.query(&mget).await?;

        Ok(ids
            .into_iter()
            .zip(owners)
            .filter(|(_, owner)| owner.as_deref() == Some(horde))
            .filter_map(|(id, _)| {
                let created_at = DateTime::parse_from_rfc3339(stamps.get(&id)?)
                    .ok()?
                    .with_timezone(&Utc);
                Some(HordeEntry { id, created_at })
            })
            .collect())
    }

    fn limits(&self) -> StoreLimits {
        *self.limits.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_limits(&self, limits: StoreLimits) {
        *self.limits.write().unwrap_or_else(PoisonError::into_inner) = limits;
    }

    async fn set_address(&self, address: &str) -> Result<(), StoreError> {
        let transport = self.link.pool.endpoint().transport;
        if self
            .link
            .pool
            .set_connection(Endpoint::new(transport, address))
        {
            info!(address, "redis address changed");
        }
        Ok(())
    }
}
