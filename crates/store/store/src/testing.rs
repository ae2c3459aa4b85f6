use std::time::Duration;

use bytes::Bytes;

use goblin_core::{GobMetadata, MIB, StoreLimits, TtlPolicy};

use crate::error::StoreError;
use crate::store::DataStore;

fn metadata(id: &str, token: &str, data: &[u8]) -> GobMetadata {
    GobMetadata::new(id, token, "198.51.100.4", data)
}

async fn put(store: &dyn DataStore, id: &str, token: &str, data: &[u8]) -> Result<(), StoreError> {
    let written = store
        .put_blob(Bytes::copy_from_slice(data), &metadata(id, token, data))
        .await?;
    assert!(written, "put_blob of fresh id {id} should succeed");
    Ok(())
}

/// Poll `check` until it holds, for state a backend applies in the background.
async fn eventually<F, Fut>(mut check: F) -> Result<bool, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool, StoreError>>,
{
    for _ in 0..50 {
        if check().await? {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(false)
}

/// Run the full data store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
/// The suite temporarily changes the store's limits and restores them before
/// returning.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn DataStore) -> Result<(), StoreError> {
    test_missing_lookups(store).await?;
    test_put_and_get(store).await?;
    test_put_collision(store).await?;
    test_append(store).await?;
    test_append_bounded_window(store).await?;
    test_ttl_armed(store).await?;
    test_soft_delete(store).await?;
    test_restore(store).await?;
    test_horde_ordering(store).await?;
    test_horde_removal_idempotent(store).await?;
    test_horde_follows_gob_lifetime(store).await?;
    Ok(())
}

async fn test_missing_lookups(store: &dyn DataStore) -> Result<(), StoreError> {
    assert!(store.get_blob("NoSuchGob").await?.is_none());
    assert!(store.get_blob_len("NoSuchGob").await?.is_none());
    assert!(!store.id_exists("NoSuchGob").await?);
    assert!(store.token_to_id("NoSuchToken").await?.is_none());
    assert!(store.append_blob("NoSuchGob", b"x").await?.is_none());
    assert!(!store.delete_blob("NoSuchGob").await?);
    assert!(store.get_horde("no-such-horde").await?.is_empty());
    assert!(!store.remove_from_horde("NoSuchGob").await?);
    Ok(())
}

async fn test_put_and_get(store: &dyn DataStore) -> Result<(), StoreError> {
    let data = b"<html><body>hello</body></html>";
    put(store, "RoundTrip", "RoundTripTokenAa", data).await?;

    let gob = store
        .get_blob("RoundTrip")
        .await?
        .expect("stored gob should be readable");
    assert_eq!(gob.data.as_ref(), data);
    assert_eq!(gob.metadata.id, "RoundTrip");
    assert_eq!(gob.metadata.token, "RoundTripTokenAa");
    assert_eq!(gob.metadata.content_type, "text/html; charset=utf-8");

    assert!(store.id_exists("RoundTrip").await?);
    assert!(store.token_exists("RoundTripTokenAa").await?);
    assert_eq!(
        store.token_to_id("RoundTripTokenAa").await?.as_deref(),
        Some("RoundTrip")
    );
    assert_eq!(store.get_blob_len("RoundTrip").await?, Some(data.len() as u64));
    Ok(())
}

async fn test_put_collision(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Collide", "CollideTokenAaaa", b"first").await?;

    let reused_id = store
        .put_blob(
            Bytes::from_static(b"second"),
            &metadata("Collide", "CollideTokenBbbb", b"second"),
        )
        .await?;
    assert!(!reused_id, "put_blob must refuse a live id");

    let reused_token = store
        .put_blob(
            Bytes::from_static(b"third"),
            &metadata("CollideOther", "CollideTokenAaaa", b"third"),
        )
        .await?;
    assert!(!reused_token, "put_blob must refuse a live token");

    let gob = store.get_blob("Collide").await?.expect("original survives");
    assert_eq!(gob.data.as_ref(), b"first");
    assert!(!store.id_exists("CollideOther").await?);
    assert!(!store.token_exists("CollideTokenBbbb").await?);
    Ok(())
}

async fn test_append(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Appender", "AppenderTokenAaa", b"hello").await?;
    let len = store.append_blob("Appender", b", world").await?;
    assert_eq!(len, Some(12));
    let gob = store.get_blob("Appender").await?.expect("gob exists");
    assert_eq!(gob.data.as_ref(), b"hello, world");
    Ok(())
}

async fn test_append_bounded_window(store: &dyn DataStore) -> Result<(), StoreError> {
    let original = store.limits();
    store.set_limits(StoreLimits {
        max_object_size: 8,
        ..original
    });

    let outcome = async {
        put(store, "Window", "WindowTokenAaaaa", b"abcdef").await?;
        let len = store.append_blob("Window", b"ghij").await?;
        assert_eq!(len, Some(8));
        let gob = store.get_blob("Window").await?.expect("gob exists");
        assert_eq!(gob.data.as_ref(), b"cdefghij", "oldest bytes are dropped first");

        let len = store.append_blob("Window", b"0123456789").await?;
        assert_eq!(len, Some(8));
        let gob = store.get_blob("Window").await?.expect("gob exists");
        assert_eq!(gob.data.as_ref(), b"23456789");
        Ok(())
    }
    .await;

    store.set_limits(original);
    outcome
}

async fn test_ttl_armed(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Lifetime", "LifetimeTokenAaa", b"short text").await?;
    let year = store.limits().ttl.ttl_for(0);
    let armed = eventually(move || async move {
        Ok(store
            .blob_ttl("Lifetime")
            .await?
            .is_some_and(|ttl| ttl <= year && ttl > year - Duration::from_secs(3600)))
    })
    .await?;
    assert!(armed, "small gob should get the small-object lifetime");

    let big = vec![b'z'; usize::try_from(2 * MIB).unwrap_or(usize::MAX)];
    put(store, "BigLifetime", "BigLifetimeToken", &big).await?;
    let expected = store.limits().ttl.ttl_for(2 * MIB);
    let armed = eventually(move || async move {
        Ok(store
            .blob_ttl("BigLifetime")
            .await?
            .is_some_and(|ttl| ttl <= expected && ttl > expected - Duration::from_secs(3600)))
    })
    .await?;
    assert!(armed, "large gob should get a size-scaled lifetime");
    Ok(())
}

async fn test_soft_delete(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Doomed", "DoomedTokenAaaaa", b"bye").await?;

    assert!(store.delete_blob("Doomed").await?);
    assert!(store.get_blob("Doomed").await?.is_none(), "deleted gob is unreachable");
    assert!(!store.id_exists("Doomed").await?);
    assert!(store.token_to_id("DoomedTokenAaaaa").await?.is_none());

    let recovered = store
        .get_deleted_blob("Doomed")
        .await?
        .expect("deleted gob stays recoverable");
    assert_eq!(recovered.data.as_ref(), b"bye");

    assert!(!store.delete_blob("Doomed").await?, "second delete is a no-op");
    Ok(())
}

async fn test_restore(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Phoenix", "PhoenixTokenAaaa", b"again").await?;
    assert!(store.delete_blob("Phoenix").await?);

    assert!(store.restore_blob("Phoenix").await?);
    let gob = store.get_blob("Phoenix").await?.expect("restored gob");
    assert_eq!(gob.data.as_ref(), b"again");
    assert_eq!(
        store.token_to_id("PhoenixTokenAaaa").await?.as_deref(),
        Some("Phoenix")
    );
    assert!(store.get_deleted_blob("Phoenix").await?.is_none());
    assert!(!store.restore_blob("Phoenix").await?, "nothing left to restore");
    Ok(())
}

async fn test_horde_ordering(store: &dyn DataStore) -> Result<(), StoreError> {
    store.add_to_horde("conformance-horde", "HordeA").await?;
    store.add_to_horde("conformance-horde", "HordeB").await?;

    let horde = store.get_horde("conformance-horde").await?;
    let ids: Vec<&str> = horde.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["HordeB", "HordeA"], "most recent entry comes first");
    assert!(horde[0].created_at >= horde[1].created_at);
    Ok(())
}

async fn test_horde_removal_idempotent(store: &dyn DataStore) -> Result<(), StoreError> {
    store.add_to_horde("removal-horde", "KeepMe").await?;
    store.add_to_horde("removal-horde", "DropMe").await?;

    assert!(store.remove_from_horde("DropMe").await?);
    let ids: Vec<String> = store
        .get_horde("removal-horde")
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, ["KeepMe"]);

    assert!(
        !store.remove_from_horde("DropMe").await?,
        "second removal is a no-op"
    );
    Ok(())
}

async fn horde_ids(store: &dyn DataStore, horde: &str) -> Result<Vec<String>, StoreError> {
    Ok(store
        .get_horde(horde)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect())
}

async fn test_horde_follows_gob_lifetime(store: &dyn DataStore) -> Result<(), StoreError> {
    put(store, "Reissued", "ReissuedTokenAaa", b"alice").await?;
    store.add_to_horde("alice-horde", "Reissued").await?;
    assert_eq!(horde_ids(store, "alice-horde").await?, ["Reissued"]);

    let original = store.limits();
    store.set_limits(StoreLimits {
        ttl: TtlPolicy {
            small_object_days: 0,
            ..original.ttl
        },
        ..original
    });
    let outcome = async {
        // A read re-arms the lifetime, which is now zero.
        store.get_blob("Reissued").await?;
        let gone = eventually(move || async move { Ok(!store.id_exists("Reissued").await?) }).await?;
        assert!(gone, "gob with a zero lifetime expires");
        let delisted = eventually(move || async move {
            Ok(store.get_horde("alice-horde").await?.is_empty())
        })
        .await?;
        assert!(delisted, "expired gob leaves its horde");
        Ok::<(), StoreError>(())
    }
    .await;
    store.set_limits(original);
    outcome?;

    put(store, "Reissued", "ReissuedTokenBbb", b"bob").await?;
    store.add_to_horde("bob-horde", "Reissued").await?;
    assert!(
        horde_ids(store, "alice-horde").await?.is_empty(),
        "reissued id must not show up in the old horde"
    );
    assert_eq!(horde_ids(store, "bob-horde").await?, ["Reissued"]);

    assert!(store.remove_from_horde("Reissued").await?);
    assert!(horde_ids(store, "alice-horde").await?.is_empty());
    assert!(horde_ids(store, "bob-horde").await?.is_empty());
    Ok(())
}
