use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tracing::{debug, info, warn};

use goblin_core::{GobMetadata, HordeEntry};
use goblin_store::DataStore;

use crate::error::GobError;
use crate::generator::{Generator, Namespace};
use crate::settings::GobSettings;

/// Gob operations shared by all request handlers.
///
/// Cheap to share behind an [`Arc`]. Settings are read once at the start of
/// each operation, so a concurrent [`configure`](Self::configure) never
/// mixes old and new generator lengths or size checks within one call.
///
/// Lifetimes are the exception: the backend arms them from its own limits
/// when it writes, so an upload already past its size check when
/// `configure` lands gets the new TTL policy.
pub struct GobStore {
    store: Arc<dyn DataStore>,
    settings: RwLock<GobSettings>,
}

impl GobStore {
    /// Wrap `store`, applying the limits from `settings` to it.
    pub fn new(store: Arc<dyn DataStore>, settings: GobSettings) -> Self {
        store.set_limits(settings.limits());
        Self {
            store,
            settings: RwLock::new(settings),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> GobSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The backend this facade runs on.
    pub fn data_store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    /// Apply new settings.
    ///
    /// Invalid settings are rejected before anything changes. The backend
    /// address switches first; the store limits and the facade settings are
    /// then swapped under the settings lock, so a caller that sees the new
    /// settings also sees the new limits.
    pub async fn configure(&self, settings: GobSettings) -> Result<(), GobError> {
        settings.validate()?;
        self.store.set_address(&settings.address).await?;

        let mut current = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.store.set_limits(settings.limits());
        info!(
            id_length = settings.id_length,
            token_length = settings.token_length,
            max_object_size = settings.max_object_size,
            "gob settings applied"
        );
        *current = settings;
        Ok(())
    }

    /// Store `data` under a fresh id and token.
    ///
    /// Returns `(id, token)`.
    pub async fn put_gob(&self, data: Bytes, ip: &str) -> Result<(String, String), GobError> {
        let settings = self.settings();
        let size = data.len() as u64;
        if size > settings.max_object_size {
            return Err(GobError::TooLarge {
                size,
                limit: settings.max_object_size,
            });
        }

        let generator = Generator::new(self.store.as_ref(), settings.max_attempts);
        let mut contended = Namespace::Id;
        for attempt in 1..=settings.max_attempts {
            let id = generator.new_id(settings.id_length).await?;
            let token = generator.new_token(settings.token_length).await?;
            let metadata = GobMetadata::new(&id, &token, ip, &data);
            if self.store.put_blob(data.clone(), &metadata).await? {
                info!(id = %id, size, content_type = %metadata.content_type, "stored gob");
                return Ok((id, token));
            }
            contended = if self.store.id_exists(&id).await? {
                Namespace::Id
            } else {
                Namespace::Token
            };
            debug!(attempt, namespace = %contended, "claimed concurrently, retrying");
        }
        Err(GobError::Exhausted {
            namespace: contended,
            attempts: settings.max_attempts,
        })
    }

    /// [`put_gob`](Self::put_gob), then add the new id to `horde`.
    pub async fn put_horde_gob(
        &self,
        horde: &str,
        data: Bytes,
        ip: &str,
    ) -> Result<(String, String), GobError> {
        let (id, token) = self.put_gob(data, ip).await?;
        self.store.add_to_horde(horde, &id).await?;
        Ok((id, token))
    }

    /// Payload and sniffed content type of a live gob.
    pub async fn get_gob(&self, id: &str) -> Result<Option<(Bytes, String)>, GobError> {
        Ok(self
            .store
            .get_blob(id)
            .await?
            .map(|gob| (gob.data, gob.metadata.content_type)))
    }

    /// Append to a gob, sliding out the oldest bytes past the size limit.
    ///
    /// Returns the new length, or `None` if the gob does not exist.
    pub async fn append_gob(&self, id: &str, data: &[u8]) -> Result<Option<u64>, GobError> {
        Ok(self.store.append_blob(id, data).await?)
    }

    /// Soft-delete a gob and drop it from its horde.
    ///
    /// Horde removal is attempted even when the delete fails; the first
    /// error is returned. Returns whether a live gob was deleted.
    pub async fn del_gob(&self, id: &str) -> Result<bool, GobError> {
        let deleted = self.store.delete_blob(id).await;
        let unlisted = self.store.remove_from_horde(id).await;
        if let Err(e) = &unlisted {
            warn!(id, error = %e, "failed to remove gob from horde");
        }
        let deleted = deleted?;
        unlisted?;
        if deleted {
            info!(id, "deleted gob");
        }
        Ok(deleted)
    }

    /// Delete the gob `token` grants rights over.
    ///
    /// Returns the deleted id, or `None` if the token is unknown.
    pub async fn del_gob_by_token(&self, token: &str) -> Result<Option<String>, GobError> {
        let Some(id) = self.store.token_to_id(token).await? else {
            return Ok(None);
        };
        Ok(self.del_gob(&id).await?.then_some(id))
    }

    /// Bring back a soft-deleted gob inside its grace window.
    pub async fn restore_gob(&self, id: &str) -> Result<bool, GobError> {
        Ok(self.store.restore_blob(id).await?)
    }

    pub async fn get_horde(&self, horde: &str) -> Result<Vec<HordeEntry>, GobError> {
        Ok(self.store.get_horde(horde).await?)
    }

    pub async fn token_to_id(&self, token: &str) -> Result<Option<String>, GobError> {
        Ok(self.store.token_to_id(token).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use goblin_core::{Gob, MIB, StoreLimits};
    use goblin_store::StoreError;
    use goblin_store_memory::MemoryDataStore;

    use super::*;

    fn gob_store() -> GobStore {
        GobStore::new(Arc::new(MemoryDataStore::new()), GobSettings::default())
    }

    /// Memory store where another writer always claims the token between
    /// the generator's check and the put.
    #[derive(Default)]
    struct TokenThief {
        inner: MemoryDataStore,
        stolen: AtomicU32,
    }

    #[async_trait]
    impl DataStore for TokenThief {
        async fn id_exists(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.id_exists(id).await
        }
        async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
            self.inner.token_exists(token).await
        }
        async fn put_blob(&self, data: Bytes, metadata: &GobMetadata) -> Result<bool, StoreError> {
            let n = self.stolen.fetch_add(1, Ordering::SeqCst);
            let rival = GobMetadata::new(format!("Thief{n}"), &metadata.token, "10.0.0.1", b"x");
            self.inner.put_blob(Bytes::from_static(b"x"), &rival).await?;
            self.inner.put_blob(data, metadata).await
        }
        async fn append_blob(&self, id: &str, chunk: &[u8]) -> Result<Option<u64>, StoreError> {
            self.inner.append_blob(id, chunk).await
        }
        async fn get_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
            self.inner.get_blob(id).await
        }
        async fn get_blob_len(&self, id: &str) -> Result<Option<u64>, StoreError> {
            self.inner.get_blob_len(id).await
        }
        async fn blob_ttl(&self, id: &str) -> Result<Option<Duration>, StoreError> {
            self.inner.blob_ttl(id).await
        }
        async fn delete_blob(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.delete_blob(id).await
        }
        async fn get_deleted_blob(&self, id: &str) -> Result<Option<Gob>, StoreError> {
            self.inner.get_deleted_blob(id).await
        }
        async fn restore_blob(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.restore_blob(id).await
        }
        async fn token_to_id(&self, token: &str) -> Result<Option<String>, StoreError> {
            self.inner.token_to_id(token).await
        }
        async fn add_to_horde(&self, horde: &str, id: &str) -> Result<(), StoreError> {
            self.inner.add_to_horde(horde, id).await
        }
        async fn remove_from_horde(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.remove_from_horde(id).await
        }
        async fn get_horde(&self, horde: &str) -> Result<Vec<HordeEntry>, StoreError> {
            self.inner.get_horde(horde).await
        }
        fn limits(&self) -> StoreLimits {
            self.inner.limits()
        }
        fn set_limits(&self, limits: StoreLimits) {
            self.inner.set_limits(limits);
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let gobs = gob_store();
        let data = Bytes::from_static(b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR");
        let (id, token) = gobs.put_gob(data.clone(), "203.0.113.9").await.unwrap();
        assert_eq!(id.len(), 6);
        assert_eq!(token.len(), 16);

        let (fetched, content_type) = gobs.get_gob(&id).await.unwrap().expect("stored");
        assert_eq!(fetched, data);
        assert_eq!(content_type, "image/png");
        assert_eq!(gobs.token_to_id(&token).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn issued_ids_and_tokens_are_unique() {
        let gobs = gob_store();
        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for i in 0..200 {
            let (id, token) = gobs
                .put_gob(Bytes::from(format!("gob {i}")), "127.0.0.1")
                .await
                .unwrap();
            assert!(ids.insert(id));
            assert!(tokens.insert(token));
        }
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let gobs = gob_store();
        gobs.configure(GobSettings {
            max_object_size: 4,
            ..GobSettings::default()
        })
        .await
        .unwrap();

        let err = gobs
            .put_gob(Bytes::from_static(b"12345"), "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, GobError::TooLarge { size: 5, limit: 4 }));
    }

    #[tokio::test]
    async fn append_slides_instead_of_failing() {
        let gobs = gob_store();
        gobs.configure(GobSettings {
            max_object_size: 4,
            ..GobSettings::default()
        })
        .await
        .unwrap();

        let (id, _) = gobs
            .put_gob(Bytes::from_static(b"ab"), "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(gobs.append_gob(&id, b"cdef").await.unwrap(), Some(4));
        let (data, _) = gobs.get_gob(&id).await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"cdef");
        assert_eq!(gobs.append_gob("missing", b"x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_gob_removes_from_horde() {
        let gobs = gob_store();
        let (keep, _) = gobs
            .put_horde_gob("logs", Bytes::from_static(b"one"), "127.0.0.1")
            .await
            .unwrap();
        let (doomed, token) = gobs
            .put_horde_gob("logs", Bytes::from_static(b"two"), "127.0.0.1")
            .await
            .unwrap();

        let listed: Vec<String> = gobs
            .get_horde("logs")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, [doomed.clone(), keep.clone()]);

        assert!(gobs.del_gob(&doomed).await.unwrap());
        assert!(gobs.get_gob(&doomed).await.unwrap().is_none());
        assert!(gobs.token_to_id(&token).await.unwrap().is_none());
        let listed: Vec<String> = gobs
            .get_horde("logs")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, [keep]);
    }

    #[tokio::test]
    async fn del_gob_by_token_resolves_id() {
        let gobs = gob_store();
        let (id, token) = gobs
            .put_gob(Bytes::from_static(b"secret"), "127.0.0.1")
            .await
            .unwrap();

        assert_eq!(gobs.del_gob_by_token(&token).await.unwrap(), Some(id.clone()));
        assert!(gobs.get_gob(&id).await.unwrap().is_none());
        assert_eq!(gobs.del_gob_by_token(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleted_gob_can_be_restored() {
        let gobs = gob_store();
        let (id, _) = gobs
            .put_gob(Bytes::from_static(b"oops"), "127.0.0.1")
            .await
            .unwrap();
        assert!(gobs.del_gob(&id).await.unwrap());
        assert!(gobs.restore_gob(&id).await.unwrap());
        let (data, _) = gobs.get_gob(&id).await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"oops");
    }

    #[tokio::test]
    async fn configure_changes_lengths_and_limits() {
        let gobs = gob_store();
        gobs.configure(GobSettings {
            id_length: 9,
            token_length: 24,
            max_object_size: 2 * MIB,
            ..GobSettings::default()
        })
        .await
        .unwrap();

        let (id, token) = gobs
            .put_gob(Bytes::from_static(b"x"), "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(id.len(), 9);
        assert_eq!(token.len(), 24);
        assert_eq!(gobs.data_store().limits().max_object_size, 2 * MIB);
    }

    #[tokio::test]
    async fn full_id_space_reports_exhaustion() {
        let gobs = gob_store();
        gobs.configure(GobSettings {
            id_length: 1,
            max_attempts: 4,
            ..GobSettings::default()
        })
        .await
        .unwrap();
        for letter in crate::ALPHABET {
            let id = char::from(*letter).to_string();
            let token = format!("filler-{id}");
            let meta = GobMetadata::new(&id, token, "127.0.0.1", b"x");
            gobs.data_store()
                .put_blob(Bytes::from_static(b"x"), &meta)
                .await
                .unwrap();
        }

        let err = gobs
            .put_gob(Bytes::from_static(b"y"), "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GobError::Exhausted {
                namespace: Namespace::Id,
                attempts: 4
            }
        ));
    }

    #[tokio::test]
    async fn token_races_report_token_exhaustion() {
        let store = Arc::new(TokenThief::default());
        let gobs = GobStore::new(
            store.clone(),
            GobSettings {
                max_attempts: 3,
                ..GobSettings::default()
            },
        );

        let err = gobs
            .put_gob(Bytes::from_static(b"mine"), "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GobError::Exhausted {
                namespace: Namespace::Token,
                attempts: 3
            }
        ));
        assert_eq!(store.stolen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalid_settings_leave_current_ones() {
        let gobs = gob_store();
        let err = gobs
            .configure(GobSettings {
                max_attempts: 0,
                max_object_size: 1,
                ..GobSettings::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GobError::InvalidSettings(_)));
        assert_eq!(gobs.settings(), GobSettings::default());
        assert_eq!(
            gobs.data_store().limits(),
            GobSettings::default().limits()
        );
    }

    #[tokio::test]
    async fn configured_settings_and_limits_agree() {
        let gobs = gob_store();
        let next = GobSettings {
            max_object_size: 3 * MIB,
            ..GobSettings::default()
        };
        gobs.configure(next.clone()).await.unwrap();
        assert_eq!(gobs.settings(), next);
        assert_eq!(gobs.data_store().limits(), next.limits());
    }
}
