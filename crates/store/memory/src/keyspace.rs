use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

/// Value held under a single key.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Bytes(Bytes),
    Text(String),
    List(VecDeque<String>),
    Stamps(HashMap<String, DateTime<Utc>>),
}

/// A single entry in the keyspace.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// String-keyed map with per-key expiry, evicted lazily on access.
///
/// Mirrors the handful of key-value primitives the Redis backend relies on so
/// both backends share one key scheme.
#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    data: DashMap<String, Entry>,
}

impl Keyspace {
    /// Clone the value under `key` if it is live.
    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        self.data.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    pub(crate) fn get_bytes(&self, key: &str) -> Option<Bytes> {
        match self.get(key)? {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn exists(&self, key: &str) -> bool {
        self.data.get(key).is_some_and(|entry| !entry.is_expired())
    }

    /// Set a value without an expiry, overwriting any previous entry.
    pub(crate) fn set(&self, key: String, value: Value) {
        self.data.insert(
            key,
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Replace the value of a live key, keeping its expiry.
    pub(crate) fn replace(&self, key: &str, value: Value) -> bool {
        match self.data.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.value = value;
                true
            }
            _ => false,
        }
    }

    /// Arm an expiry on a live key. A zero TTL expires it at once.
    pub(crate) fn expire(&self, key: &str, ttl: Duration) -> bool {
        match self.data.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            _ => false,
        }
    }

    /// Remaining lifetime of a live key with an expiry.
    pub(crate) fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.data.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Move a live key to `to`, overwriting it. The expiry travels with the
    /// value.
    pub(crate) fn rename(&self, from: &str, to: &str) -> bool {
        let Some((_, entry)) = self.data.remove(from) else {
            return false;
        };
        if entry.is_expired() {
            return false;
        }
        self.data.insert(to.to_owned(), entry);
        true
    }

    /// Insert at the head of the list under `key`, creating it if needed.
    pub(crate) fn push_front(&self, key: &str, item: String) {
        self.with_live(key, || Value::List(VecDeque::new()), |value| {
            if let Value::List(list) = value {
                list.push_front(item);
            }
        });
    }

    /// Remove the first occurrence of `item` from the list under `key`.
    pub(crate) fn remove_first(&self, key: &str, item: &str) {
        if let Some(mut entry) = self.data.get_mut(key) {
            if let Value::List(list) = &mut entry.value {
                if let Some(pos) = list.iter().position(|x| x == item) {
                    list.remove(pos);
                }
            }
        }
        self.data
            .remove_if(key, |_, entry| matches!(&entry.value, Value::List(l) if l.is_empty()));
    }

    pub(crate) fn stamp(&self, key: &str, field: String, at: DateTime<Utc>) {
        self.with_live(key, || Value::Stamps(HashMap::new()), |value| {
            if let Value::Stamps(stamps) = value {
                stamps.insert(field, at);
            }
        });
    }

    pub(crate) fn unstamp(&self, key: &str, field: &str) {
        if let Some(mut entry) = self.data.get_mut(key) {
            if let Value::Stamps(stamps) = &mut entry.value {
                stamps.remove(field);
            }
        }
        self.data
            .remove_if(key, |_, entry| matches!(&entry.value, Value::Stamps(s) if s.is_empty()));
    }

    /// Run `update` on the live value under `key`, starting from `init` when
    /// the key is missing or expired.
    fn with_live(&self, key: &str, init: impl FnOnce() -> Value, update: impl FnOnce(&mut Value)) {
        let mut entry = match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Entry {
                        value: init(),
                        expires_at: None,
                    });
                }
                occupied.into_ref()
            }
            MapEntry::Vacant(vacant) => vacant.insert(Entry {
                value: init(),
                expires_at: None,
            }),
        };
        update(&mut entry.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_keys_vanish() {
        let ks = Keyspace::default();
        ks.set("k".into(), Value::Text("v".into()));
        assert!(ks.expire("k", Duration::from_secs(5)));
        assert_eq!(ks.get_text("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(ks.get_text("k").is_none());
        assert!(!ks.exists("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn rename_carries_expiry() {
        let ks = Keyspace::default();
        ks.set("a".into(), Value::Text("v".into()));
        ks.expire("a", Duration::from_secs(10));
        assert!(ks.rename("a", "b"));
        assert!(!ks.exists("a"));
        let ttl = ks.ttl("b").expect("expiry kept");
        assert_eq!(ttl, Duration::from_secs(10));
    }

    #[test]
    fn list_keeps_insertion_order_newest_first() {
        let ks = Keyspace::default();
        ks.push_front("l", "a".into());
        ks.push_front("l", "b".into());
        ks.push_front("l", "a".into());
        ks.remove_first("l", "a");
        match ks.get("l") {
            Some(Value::List(list)) => assert_eq!(list, ["b", "a"]),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn emptied_collections_are_dropped() {
        let ks = Keyspace::default();
        ks.push_front("l", "a".into());
        ks.remove_first("l", "a");
        assert!(!ks.exists("l"));

        ks.stamp("s", "a".into(), Utc::now());
        ks.unstamp("s", "a");
        assert!(!ks.exists("s"));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let ks = Keyspace::default();
        ks.set("k".into(), Value::Bytes(Bytes::from_static(b"x")));
        ks.expire("k", Duration::ZERO);
        assert!(ks.get_bytes("k").is_none());
    }
}
