use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use goblin_core::{
    Gob, GobMetadata, HordeEntry, StoreLimits, bounded_append, decode_metadata, encode_metadata,
};
use goblin_store::{DataStore, GobKey, StoreError};

use crate::keyspace::{Keyspace, Value};

/// In-memory [`DataStore`] backed by a [`DashMap`](dashmap::DashMap).
///
/// Uses the same key layout and soft-delete protocol as the Redis backend.
/// Expired entries are lazily evicted on access. Lifetimes are applied
/// synchronously, so `blob_ttl` reflects a write as soon as it returns.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    keys: Keyspace,
    /// Serializes operations that touch more than one key.
    writes: Mutex<()>,
    limits: RwLock<StoreLimits>,
}

impl MemoryDataStore {
    /// Create a new, empty in-memory data store with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given limits.
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits: RwLock::new(limits),
            ..Self::default()
        }
    }

    fn write_gate(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give payload, metadata, token mapping and horde link the lifetime for
    /// `size`.
    fn arm_ttl(&self, id: &str, token: &str, size: u64) {
        let ttl = self.limits().ttl.ttl_for(size);
        for key in [
            GobKey::data(id),
            GobKey::meta(id),
            GobKey::token(token),
            GobKey::id_horde(id),
        ] {
            self.keys.expire(&key.canonical(), ttl);
        }
    }

    fn read_gob(&self, data_key: &str, meta_key: &str) -> Result<Option<Gob>, StoreError> {
        let (Some(data), Some(meta)) = (self.keys.get_bytes(data_key), self.keys.get_bytes(meta_key))
        else {
            return Ok(None);
        };
        let metadata = decode_metadata(&meta)?;
        Ok(Some(Gob { metadata, data }))
    }

    fn read_metadata(&self, meta_key: &str) -> Result<Option<GobMetadata>, StoreError> {
        self.keys
            .get_bytes(meta_key)
            .map(|raw| decode_metadata(&raw))
            .transpose()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn id_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.keys.exists(&GobKey::data(id).canonical()))
    }

    async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.keys.exists(&GobKey::token(token).canonical()))
    }

    async fn put_blob(&self, data: Bytes, metadata: &GobMetadata) -> Result<bool, StoreError> {
        let encoded = encode_metadata(metadata)?;
        let data_key = GobKey::data(&metadata.id).canonical();
        let meta_key = GobKey::meta(&metadata.id).canonical();
        let token_key = GobKey::token(&metadata.token).canonical();
        let size = data.len() as u64;

        {
            let _gate = self.write_gate();
            if [&data_key, &meta_key, &token_key]
                .iter()
                .any(|key| self.keys.exists(key))
            {
                debug!(id = %metadata.id, "refusing put over live id or token");
                return Ok(false);
            }
            self.keys.set(data_key, Value::Bytes(data));
            self.keys.set(meta_key, Value::Bytes(Bytes::from(encoded)));
            self.keys
                .set(token_key, Value::Text(metadata.id.clone()));
            self.arm_ttl(&metadata.id, &metadata.token, size);
        }
        Ok(true)
    }

    async fn append_blob(&self, id: &str, chunk: &[u8]) -> Result<Option<u64>, StoreError> {
        let data_key = GobKey::data(id).canonical();
        let max = usize::try_from(self.limits().max_object_size).unwrap_or(usize::MAX);

        let _gate = self.write_gate();
        let Some(metadata) = self.read_metadata(&GobKey::meta(id).canonical())? else {
            return Ok(None);
        };
        let Some(current) = self.keys.get_bytes(&data_key) else {
            return Ok(None);
        };
        let next = bounded_append(&current, chunk, max);
        let len = next.len() as u64;
        self.keys.replace(&data_key, Value::Bytes(Bytes::from(next)));
        self.arm_ttl(id, &metadata.token, len);
        Ok(Some(len))
    }

    async fn get_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
        let gob = self.read_gob(
            &GobKey::data(id).canonical(),
            &GobKey::meta(id).canonical(),
        )?;
        if let Some(gob) = &gob {
            self.arm_ttl(id, &gob.metadata.token, gob.len() as u64);
        }
        Ok(gob)
    }

    async fn get_blob_len(&self, id: &str) -> Result<Option<u64>, StoreError> {
        Ok(self
            .keys
            .get_bytes(&GobKey::data(id).canonical())
            .map(|data| data.len() as u64))
    }

    async fn blob_ttl(&self, id: &str) -> Result<Option<Duration>, StoreError> {
        Ok(self.keys.ttl(&GobKey::data(id).canonical()))
    }

    async fn delete_blob(&self, id: &str) -> Result<bool, StoreError> {
        let data = GobKey::data(id);
        let meta = GobKey::meta(id);
        let grace = self.limits().ttl.deleted_grace();

        let _gate = self.write_gate();
        let Some(metadata) = self.read_metadata(&meta.canonical())? else {
            return Ok(false);
        };
        let token = GobKey::token(&metadata.token);

        let mut moved = false;
        for key in [&data, &meta, &token] {
            let deleted = key.deleted();
            if self.keys.rename(&key.canonical(), &deleted) {
                self.keys.expire(&deleted, grace);
                moved = true;
            }
        }
        debug!(id, "soft-deleted gob");
        Ok(moved)
    }

    async fn get_deleted_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
        self.read_gob(&GobKey::data(id).deleted(), &GobKey::meta(id).deleted())
    }

    async fn restore_blob(&self, id: &str) -> Result<bool, StoreError> {
        let data = GobKey::data(id);
        let meta = GobKey::meta(id);

        let _gate = self.write_gate();
        let Some(metadata) = self.read_metadata(&meta.deleted())? else {
            return Ok(false);
        };
        let token = GobKey::token(&metadata.token);
        let Some(size) = self
            .keys
            .get_bytes(&data.deleted())
            .map(|data| data.len() as u64)
        else {
            return Ok(false);
        };
        if [&data, &meta, &token]
            .iter()
            .any(|key| self.keys.exists(&key.canonical()))
        {
            debug!(id, "live id or token in the way, not restoring");
            return Ok(false);
        }

        for key in [&data, &meta, &token] {
            self.keys.rename(&key.deleted(), &key.canonical());
        }
        self.arm_ttl(id, &metadata.token, size);
        Ok(true)
    }

    async fn token_to_id(&self, token: &str) -> Result<Option<String>, StoreError> {
        Ok(self.keys.get_text(&GobKey::token(token).canonical()))
    }

    async fn add_to_horde(&self, horde: &str, id: &str) -> Result<(), StoreError> {
        let list = GobKey::horde_list(horde).canonical();
        let id_horde = GobKey::id_horde(id).canonical();

        let _gate = self.write_gate();
        self.keys.remove_first(&list, id);
        self.keys.push_front(&list, id.to_owned());
        self.keys.stamp(
            &GobKey::horde_times(horde).canonical(),
            id.to_owned(),
            Utc::now(),
        );
        self.keys.set(id_horde.clone(), Value::Text(horde.to_owned()));
        // The link dies with the gob.
        if let Some(ttl) = self.keys.ttl(&GobKey::data(id).canonical()) {
            self.keys.expire(&id_horde, ttl);
        }
        Ok(())
    }

    async fn remove_from_horde(&self, id: &str) -> Result<bool, StoreError> {
        let id_horde = GobKey::id_horde(id);
        let grace = self.limits().ttl.deleted_grace();

        let _gate = self.write_gate();
        let Some(horde) = self.keys.get_text(&id_horde.canonical()) else {
            return Ok(false);
        };
        self.keys
            .remove_first(&GobKey::horde_list(&horde).canonical(), id);
        self.keys
            .unstamp(&GobKey::horde_times(&horde).canonical(), id);
        let deleted = id_horde.deleted();
        if self.keys.rename(&id_horde.canonical(), &deleted) {
            self.keys.expire(&deleted, grace);
        }
        Ok(true)
    }

    async fn get_horde(&self, horde: &str) -> Result<Vec<HordeEntry>, StoreError> {
        let ids = match self.keys.get(&GobKey::horde_list(horde).canonical()) {
            Some(Value::List(ids)) => ids,
            _ => return Ok(Vec::new()),
        };
        let stamps = match self.keys.get(&GobKey::horde_times(horde).canonical()) {
            Some(Value::Stamps(stamps)) => stamps,
            _ => return Ok(Vec::new()),
        };
        // An id whose link is gone or names another horde has expired and
        // possibly been reissued.
        Ok(ids
            .into_iter()
            .filter(|id| {
                self.keys.get_text(&GobKey::id_horde(id).canonical()).as_deref() == Some(horde)
            })
            .filter_map(|id| {
                let created_at = *stamps.get(&id)?;
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
}
