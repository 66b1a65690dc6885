//! Listing cache and its invalidation.
//!
//! Cached pages of the public event listing live under
//! `eventos:list:{status}:{type}:{search}:{page}:{limit}`, where `{search}`
//! is `none` without a search and `q~{percent-encoded term}` with one. The
//! cache is a
//! disposable projection of the store: every entry expires after a TTL, and
//! every entry is tagged at write time with the ids of the events it shows.
//!
//! When an event's listing-relevant state changes, [`CacheInvalidator`]
//! deletes every key in the event's tag set. It also sweeps the fixed key
//! enumeration older listing writers relied on, unless that sweep is
//! disabled. All of it is best-effort: failures are logged and counted, and
//! never reach the caller.

pub mod memory;
pub mod redis;

pub use memory::InMemoryListingCache;
pub use self::redis::RedisListingCache;

use crate::error::CacheError;
use crate::types::{EventId, ListingQuery, StatusFilter, TypeFilter, DEFAULT_PAGE_SIZE};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of every listing key.
pub const LISTING_PREFIX: &str = "eventos:list";

/// Pages covered by the compatibility sweep.
pub const LEGACY_SWEEP_PAGES: u32 = 5;

/// Key of the tag set listing every cache key that shows `event_id`.
#[must_use]
pub fn tag_key(event_id: &EventId) -> String {
    format!("eventos:tag:event:{event_id}")
}

/// Key-value store for serialized listing pages.
#[async_trait]
pub trait ListingCache: Send + Sync {
    /// Read a cached page.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a page with a TTL and register it under each event's tag.
    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[EventId],
    ) -> Result<(), CacheError>;

    /// Delete keys. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Delete every key tagged with `event_id`, then the tag set itself.
    ///
    /// Returns how many tagged keys were listed.
    async fn invalidate_tag(&self, event_id: &EventId) -> Result<usize, CacheError>;
}

/// Cache key of one listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    status: StatusFilter,
    event_type: TypeFilter,
    search: Option<String>,
    page: u32,
    limit: u32,
}

impl ListingKey {
    /// Key for a normalized query.
    #[must_use]
    pub fn for_query(query: &ListingQuery) -> Self {
        Self {
            status: query.status,
            event_type: query.event_type,
            search: query.search.clone(),
            page: query.page,
            limit: query.limit,
        }
    }

    /// The fixed enumeration: every status and type, no search, pages
    /// `1..=LEGACY_SWEEP_PAGES`, default page size.
    #[must_use]
    pub fn legacy_sweep() -> Vec<Self> {
        let mut keys = Vec::with_capacity(
            StatusFilter::ALL.len() * TypeFilter::ALL.len() * LEGACY_SWEEP_PAGES as usize,
        );
        for status in StatusFilter::ALL {
            for event_type in TypeFilter::ALL {
                for page in 1..=LEGACY_SWEEP_PAGES {
                    keys.push(Self {
                        status,
                        event_type,
                        search: None,
                        page,
                        limit: DEFAULT_PAGE_SIZE,
                    });
                }
            }
        }
        keys
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{LISTING_PREFIX}:{}:{}:{}:{}:{}",
            self.status.as_str(),
            self.event_type.as_str(),
            SearchSlot(self.search.as_deref()),
            self.page,
            self.limit
        )
    }
}

/// Search segment of a key. Encoded terms never contain `:` and always
/// carry the `q~` prefix, so no term can pose as the unfiltered slot.
struct SearchSlot<'a>(Option<&'a str>);

impl fmt::Display for SearchSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("none"),
            Some(term) => write!(f, "q~{}", urlencoding::encode(term)),
        }
    }
}

/// What an invalidation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys found under the event's tag
    pub tagged_keys: usize,
    /// Keys deleted by the compatibility sweep
    pub swept_keys: usize,
    /// Cache operations that failed and were ignored
    pub failures: usize,
}

/// Best-effort invalidation of listing pages.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ListingCache>,
    legacy_sweep: bool,
}

impl CacheInvalidator {
    /// Create an invalidator; `legacy_sweep` enables the fixed key sweep.
    #[must_use]
    pub fn new(cache: Arc<dyn ListingCache>, legacy_sweep: bool) -> Self {
        Self {
            cache,
            legacy_sweep,
        }
    }

    /// Drop every cached page that could show `event_id`.
    ///
    /// Never fails; the report says what happened.
    #[tracing::instrument(skip_all, fields(event_id = %event_id))]
    pub async fn invalidate_event(&self, event_id: &EventId) -> InvalidationReport {
        let sweep_keys: Vec<String> = if self.legacy_sweep {
            ListingKey::legacy_sweep()
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let (tagged, swept) = futures::join!(
            self.cache.invalidate_tag(event_id),
            self.sweep(&sweep_keys)
        );

        let mut report = InvalidationReport::default();
        match tagged {
            Ok(count) => report.tagged_keys = count,
            Err(error) => {
                report.failures += 1;
                metrics::counter!("aca_cache_invalidation_failures_total", "step" => "tag")
                    .increment(1);
                tracing::warn!(%error, "Tagged cache invalidation failed, entries expire by TTL");
            },
        }
        match swept {
            Ok(count) => report.swept_keys = count,
            Err(error) => {
                report.failures += 1;
                metrics::counter!("aca_cache_invalidation_failures_total", "step" => "sweep")
                    .increment(1);
                tracing::warn!(%error, "Listing cache sweep failed, entries expire by TTL");
            },
        }

        tracing::debug!(
            tagged_keys = report.tagged_keys,
            swept_keys = report.swept_keys,
            failures = report.failures,
            "Listing cache invalidated"
        );
        report
    }

    async fn sweep(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.cache.delete(keys).await?;
        Ok(keys.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::EventType;
    use aca_testing::test_clock;
    use std::collections::HashSet;

    #[test]
    fn key_format_matches_listing_scheme() {
        let query = ListingQuery {
            event_type: TypeFilter::Only(EventType::Taller),
            search: Some("asado".to_string()),
            page: 7,
            ..ListingQuery::default()
        };
        assert_eq!(
            ListingKey::for_query(&query).to_string(),
            "eventos:list:published:taller:q~asado:7:12"
        );
        assert_eq!(
            ListingKey::for_query(&ListingQuery::default()).to_string(),
            "eventos:list:published:all:none:1:12"
        );
    }

    #[test]
    fn search_terms_never_share_the_unfiltered_slot() {
        let unfiltered = ListingKey::for_query(&ListingQuery::default()).to_string();
        for raw in ["None", "none", " NONE ", "none:1:12", "a:b"] {
            let query = ListingQuery {
                search: Some(raw.to_string()),
                ..ListingQuery::default()
            }
            .normalized();
            let key = ListingKey::for_query(&query).to_string();
            assert_ne!(key, unfiltered, "search {raw:?}");
            assert_eq!(key.matches(':').count(), 6, "search {raw:?} leaked a separator");
        }
        let query = ListingQuery {
            search: Some("None".to_string()),
            ..ListingQuery::default()
        }
        .normalized();
        assert_eq!(
            ListingKey::for_query(&query).to_string(),
            "eventos:list:published:all:q~none:1:12"
        );
    }

    #[test]
    fn legacy_sweep_enumerates_sixty_distinct_keys() {
        let keys: HashSet<String> = ListingKey::legacy_sweep()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys.len(), 60);
        assert!(keys.contains("eventos:list:all:webinar:none:5:12"));
        assert!(!keys.iter().any(|k| k.ends_with(":6:12")));
    }

    #[tokio::test]
    async fn invalidation_clears_tagged_and_swept_keys() {
        let cache = Arc::new(InMemoryListingCache::new(Arc::new(test_clock())));
        let ttl = Duration::from_secs(60);
        let e7 = EventId::from("E7");
        cache
            .put("eventos:list:published:all:q~asado:9:12", "[]", ttl, &[e7.clone()])
            .await
            .unwrap();
        cache
            .put("eventos:list:draft:all:none:2:12", "[]", ttl, &[])
            .await
            .unwrap();

        let report = CacheInvalidator::new(cache.clone(), true)
            .invalidate_event(&e7)
            .await;

        assert_eq!(report.tagged_keys, 1);
        assert_eq!(report.swept_keys, 60);
        assert_eq!(report.failures, 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn sweep_can_be_disabled() {
        let cache = Arc::new(InMemoryListingCache::new(Arc::new(test_clock())));
        cache
            .put(
                "eventos:list:draft:all:none:2:12",
                "[]",
                Duration::from_secs(60),
                &[],
            )
            .await
            .unwrap();

        let report = CacheInvalidator::new(cache.clone(), false)
            .invalidate_event(&EventId::from("E7"))
            .await;

        assert_eq!(report.swept_keys, 0);
        assert!(cache.contains("eventos:list:draft:all:none:2:12"));
    }

    #[tokio::test]
    async fn failures_are_reported_not_returned() {
        let cache = Arc::new(InMemoryListingCache::new(Arc::new(test_clock())));
        cache.set_unavailable(true);

        let report = CacheInvalidator::new(cache, true)
            .invalidate_event(&EventId::from("E7"))
            .await;

        assert_eq!(report.failures, 2);
    }
}
