//! In-process implementation of EphemeralStore.
//!
//! Mirrors the Redis semantics the service relies on: string values with
//! optional expiry, integer counters that keep their TTL across increments,
//! and sets. Expired entries are dropped lazily on access. Time comes from
//! `tokio::time::Instant` so tests can pause and advance the clock.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{EphemeralStore, StoreError, StoreResult, validate_ttl};

#[derive(Debug)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process implementation of EphemeralStore.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // No invariant spans a panic: every mutation is a single insert/remove.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drop `key` if it has expired.
fn expire(entries: &mut HashMap<String, Entry>, key: &str) {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Malformed {
        key: key.to_string(),
        value: "<set>".to_string(),
    }
}

fn parse_counter(key: &str, value: &str) -> StoreResult<i64> {
    value.parse().map_err(|_| StoreError::Malformed {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn ping(&self) -> StoreResult<bool> {
        Ok(true)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        validate_ttl(ttl)?;

        self.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.lock();
        expire(&mut entries, key);
        match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn increment(&self, key: &str, by: u64) -> StoreResult<u64> {
        let by = i64::try_from(by).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: by.to_string(),
        })?;

        let mut entries = self.lock();
        expire(&mut entries, key);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Text("0".to_string()),
            expires_at: None,
        });

        let Value::Text(text) = &mut entry.value else {
            return Err(wrong_type(key));
        };

        // Same range as INCRBY: signed 64-bit, overflow refused
        let next = parse_counter(key, text)?
            .checked_add(by)
            .ok_or_else(|| StoreError::Rejected {
                op: "incrby",
                reason: "increment or decrement would overflow".to_string(),
            })?;
        *text = next.to_string();

        u64::try_from(next).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: next.to_string(),
        })
    }

    async fn decrement_or_delete(&self, key: &str, by: u64) -> StoreResult<i64> {
        let mut entries = self.lock();
        let by = i64::try_from(by).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: by.to_string(),
        })?;

        expire(&mut entries, key);
        let current = match entries.get(key) {
            None => 0,
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => parse_counter(key, text)?,
            Some(_) => return Err(wrong_type(key)),
        };

        let remaining = current - by;
        if remaining <= 0 {
            entries.remove(key);
        } else if let Some(Entry {
            value: Value::Text(text),
            ..
        }) = entries.get_mut(key)
        {
            *text = remaining.to_string();
        }
        Ok(remaining)
    }

    async fn add_to_set(&self, set: &str, member: &str) -> StoreResult<()> {
        let mut entries = self.lock();
        expire(&mut entries, set);

        let entry = entries.entry(set.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });

        match &mut entry.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::Text(text) => Err(StoreError::Malformed {
                key: set.to_string(),
                value: text.clone(),
            }),
        }
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> StoreResult<()> {
        let mut entries = self.lock();

        expire(&mut entries, set);
        let now_empty = match entries.get_mut(set) {
            None => return Ok(()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => {
                return Err(StoreError::Malformed {
                    key: set.to_string(),
                    value: text.clone(),
                });
            }
        };

        // Redis deletes a set once its last member is removed
        if now_empty {
            entries.remove(set);
        }
        Ok(())
    }

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64> {
        Ok(self.set_members(set).await?.len() as u64)
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let mut entries = self.lock();
        expire(&mut entries, set);
        match entries.get(set) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Err(StoreError::Malformed {
                key: set.to_string(),
                value: text.clone(),
            }),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_expired(now));

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.lock();
        expire(&mut entries, key);
        Ok(entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ttl_entries_expire() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("blacklist:abc", "1", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(
            store.get("blacklist:abc").await.unwrap(),
            Some("1".to_string())
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("blacklist:abc").await.unwrap(), None);
        assert!(store.scan_prefix("blacklist:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn increment_creates_missing_key_at_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("post_views:7", 1).await.unwrap(), 1);
        assert_eq!(store.increment("post_views:7", 4).await.unwrap(), 5);
        assert_eq!(
            store.get("post_views:7").await.unwrap(),
            Some("5".to_string())
        );
    }

    #[tokio::test]
    async fn increment_refuses_to_overflow_signed_range() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("post_views:1", &i64::MAX.to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let err = store.increment("post_views:1", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { op: "incrby", .. }));
        assert_eq!(
            store.get("post_views:1").await.unwrap(),
            Some(i64::MAX.to_string())
        );

        // Whatever the counter holds can still be settled
        assert_eq!(
            store.decrement_or_delete("post_views:1", i64::MAX as u64).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn increment_beyond_signed_range_is_malformed() {
        let store = MemoryStore::new();

        let err = store.increment("post_views:1", u64::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
        assert_eq!(store.get("post_views:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn increment_on_text_value_is_malformed() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("post_views:1", "abc", Duration::from_secs(60))
            .await
            .unwrap();

        let err = store.increment("post_views:1", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[tokio::test]
    async fn decrement_or_delete_keeps_concurrent_increments() {
        let store = MemoryStore::new();
        store.increment("post_views:3", 5).await.unwrap();

        // Two more views land after a flush read 5
        store.increment("post_views:3", 2).await.unwrap();

        assert_eq!(store.decrement_or_delete("post_views:3", 5).await.unwrap(), 2);
        assert_eq!(
            store.get("post_views:3").await.unwrap(),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn decrement_or_delete_removes_drained_key() {
        let store = MemoryStore::new();
        store.increment("post_views:3", 5).await.unwrap();

        assert_eq!(store.decrement_or_delete("post_views:3", 5).await.unwrap(), 0);
        assert_eq!(store.get("post_views:3").await.unwrap(), None);

        // Missing key: nothing to keep
        assert_eq!(store.decrement_or_delete("post_views:3", 2).await.unwrap(), -2);
        assert_eq!(store.get("post_views:3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_operations() {
        let store = MemoryStore::new();
        store.add_to_set("online_users", "a@ongil.kr").await.unwrap();
        store.add_to_set("online_users", "b@ongil.kr").await.unwrap();
        store.add_to_set("online_users", "a@ongil.kr").await.unwrap();

        assert_eq!(store.set_cardinality("online_users").await.unwrap(), 2);
        assert_eq!(
            store.set_members("online_users").await.unwrap(),
            vec!["a@ongil.kr".to_string(), "b@ongil.kr".to_string()]
        );

        store.remove_from_set("online_users", "a@ongil.kr").await.unwrap();
        store.remove_from_set("online_users", "b@ongil.kr").await.unwrap();
        assert_eq!(store.set_cardinality("online_users").await.unwrap(), 0);
        assert!(store.scan_prefix("online").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_on_set_is_malformed() {
        let store = MemoryStore::new();
        store.add_to_set("online_users", "a@ongil.kr").await.unwrap();

        assert!(store.get("online_users").await.is_err());
    }

    #[tokio::test]
    async fn scan_prefix_filters_and_sorts() {
        let store = MemoryStore::new();
        store.increment("post_views:2", 1).await.unwrap();
        store.increment("post_views:10", 1).await.unwrap();
        store.increment("other:1", 1).await.unwrap();

        assert_eq!(
            store.scan_prefix("post_views:").await.unwrap(),
            vec!["post_views:10".to_string(), "post_views:2".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::new();
        store.increment("post_views:1", 1).await.unwrap();

        assert!(store.delete("post_views:1").await.unwrap());
        assert!(!store.delete("post_views:1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let store = store.clone();
            tasks.spawn(async move { store.increment("post_views:9", 1).await.unwrap() });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(
            store.get("post_views:9").await.unwrap(),
            Some("64".to_string())
        );
    }
}
