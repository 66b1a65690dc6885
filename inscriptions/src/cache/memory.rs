//! In-memory listing cache with TTL and tags.
//!
//! Expiry reads the injected [`Clock`], so tests step past a TTL by advancing
//! a manual clock instead of sleeping.

use super::{tag_key, ListingCache};
use crate::error::CacheError;
use crate::types::EventId;
use aca_core::environment::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tags: HashMap<String, HashSet<String>>,
}

impl Inner {
    /// Drop expired entries, then every tag member that no longer has an
    /// entry, then every emptied tag set.
    fn purge(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.expires_at > now);
        let entries = &self.entries;
        self.tags.retain(|_, keys| {
            keys.retain(|key| entries.contains_key(key));
            !keys.is_empty()
        });
    }
}

/// Listing cache held in process memory.
pub struct InMemoryListingCache {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl InMemoryListingCache {
    /// Create an empty cache reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache marked unavailable".to_string()));
        }
        Ok(())
    }

    /// Make every operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether an unexpired entry exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner()
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// Whether no unexpired entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let now = self.clock.now();
        !self
            .inner()
            .entries
            .values()
            .any(|entry| entry.expires_at > now)
    }
}

#[async_trait]
impl ListingCache for InMemoryListingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut inner = self.inner();
        inner.purge(now);
        Ok(inner.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[EventId],
    ) -> Result<(), CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut inner = self.inner();
        inner.purge(now);
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        for event_id in tags {
            inner
                .tags
                .entry(tag_key(event_id))
                .or_default()
                .insert(key.to_string());
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        self.check_available()?;
        let mut inner = self.inner();
        for key in keys {
            inner.entries.remove(key);
        }
        Ok(())
    }

    async fn invalidate_tag(&self, event_id: &EventId) -> Result<usize, CacheError> {
        self.check_available()?;
        let mut inner = self.inner();
        let Some(keys) = inner.tags.remove(&tag_key(event_id)) else {
            return Ok(0);
        };
        for key in &keys {
            inner.entries.remove(key);
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aca_testing::{test_epoch, ManualClock};

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = ManualClock::new(test_epoch());
        let cache = InMemoryListingCache::new(Arc::new(clock.clone()));
        cache
            .put("k", "v", Duration::from_secs(60), &[])
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tag_invalidation_removes_only_tagged_keys() {
        let cache = InMemoryListingCache::new(Arc::new(aca_testing::test_clock()));
        let ttl = Duration::from_secs(60);
        cache.put("a", "1", ttl, &["E1".into()]).await.unwrap();
        cache
            .put("b", "2", ttl, &["E1".into(), "E2".into()])
            .await
            .unwrap();
        cache.put("c", "3", ttl, &["E2".into()]).await.unwrap();

        assert_eq!(cache.invalidate_tag(&"E1".into()).await.unwrap(), 2);
        assert!(!cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.invalidate_tag(&"E1".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_pages_leave_their_tag_sets() {
        let clock = ManualClock::new(test_epoch());
        let cache = InMemoryListingCache::new(Arc::new(clock.clone()));
        cache
            .put("old", "1", Duration::from_secs(10), &["E1".into(), "E2".into()])
            .await
            .unwrap();
        cache
            .put("kept", "2", Duration::from_secs(60), &["E2".into()])
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(cache.get("old").await.unwrap(), None);
        {
            let inner = cache.inner();
            assert!(!inner.tags.contains_key(&tag_key(&"E1".into())));
            assert_eq!(inner.tags[&tag_key(&"E2".into())].len(), 1);
        }

        clock.advance(chrono::Duration::seconds(50));
        cache.put("new", "3", Duration::from_secs(60), &[]).await.unwrap();
        let inner = cache.inner();
        assert!(inner.tags.is_empty());
        assert_eq!(inner.entries.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_cache_fails_every_call() {
        let cache = InMemoryListingCache::new(Arc::new(aca_testing::test_clock()));
        cache.set_unavailable(true);
        assert!(cache.get("k").await.is_err());
        assert!(cache.delete(&["k".to_string()]).await.is_err());

        cache.set_unavailable(false);
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
