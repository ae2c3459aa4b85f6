use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use goblin_core::{Gob, GobMetadata, HordeEntry, StoreLimits};

use crate::error::StoreError;

/// Backend-facing gob storage.
///
/// Implementations own the key scheme and the soft-delete protocol and must be
/// `Send + Sync` and safe for concurrent access.
///
/// TTL bookkeeping may run in the background: after `put_blob`,
/// `append_blob` or `get_blob` return, the new lifetime is only guaranteed to
/// be applied *eventually*. Backends document whether they offer a
/// synchronous mode.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Whether a live gob exists under `id`.
    async fn id_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Whether `token` is currently mapped to a live gob.
    async fn token_exists(&self, token: &str) -> Result<bool, StoreError>;

    /// Store payload, metadata and the token mapping in one write.
    ///
    /// Returns `false` without writing anything if the id or the token is
    /// already taken.
    async fn put_blob(&self, data: Bytes, metadata: &GobMetadata) -> Result<bool, StoreError>;

    /// Append `chunk` to the payload of `id`, dropping the oldest bytes when
    /// the result would exceed [`StoreLimits::max_object_size`].
    ///
    /// Returns the new payload length, or `None` if the gob does not exist.
    async fn append_blob(&self, id: &str, chunk: &[u8]) -> Result<Option<u64>, StoreError>;

    /// Fetch payload and metadata. A gob missing either half is reported as
    /// not found.
    async fn get_blob(&self, id: &str) -> Result<Option<Gob>, StoreError>;

    /// Payload length without transferring the payload.
    async fn get_blob_len(&self, id: &str) -> Result<Option<u64>, StoreError>;

    /// Remaining lifetime of a live gob. `None` if the gob is missing or has
    /// no expiry armed yet.
    async fn blob_ttl(&self, id: &str) -> Result<Option<Duration>, StoreError>;

    /// Soft-delete a gob: it becomes unreachable by id and token at once and
    /// stays recoverable for the grace window.
    ///
    /// Returns `true` if a live gob was deleted.
    async fn delete_blob(&self, id: &str) -> Result<bool, StoreError>;

    /// Read a soft-deleted gob that is still inside its grace window.
    async fn get_deleted_blob(&self, id: &str) -> Result<Option<Gob>, StoreError>;

    /// Move a soft-deleted gob back into the live namespace.
    ///
    /// Returns `false` if there is nothing to restore or the id or token has
    /// been reissued in the meantime. Horde membership is not restored.
    async fn restore_blob(&self, id: &str) -> Result<bool, StoreError>;

    /// Resolve a token to its gob id.
    async fn token_to_id(&self, token: &str) -> Result<Option<String>, StoreError>;

    /// Prepend `id` to `horde` and index the membership.
    async fn add_to_horde(&self, horde: &str, id: &str) -> Result<(), StoreError>;

    /// Remove `id` from whichever horde holds it.
    ///
    /// Returns `false` when the id belongs to no horde.
    async fn remove_from_horde(&self, id: &str) -> Result<bool, StoreError>;

    /// List a horde, most recent first. A missing horde is empty.
    async fn get_horde(&self, horde: &str) -> Result<Vec<HordeEntry>, StoreError>;

    /// Currently applied limits.
    fn limits(&self) -> StoreLimits;

    /// Replace the size limit and TTL policy used by subsequent operations.
    fn set_limits(&self, limits: StoreLimits);

    /// Point the backend at a new address. Backends without an address
    /// ignore this.
    async fn set_address(&self, address: &str) -> Result<(), StoreError> {
        let _ = address;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_dyn_data_store(_: &dyn DataStore) {}
}
