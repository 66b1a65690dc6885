//! Redis listing cache.
//!
//! Pages are stored with `SET .. EX`; each page key is added to the tag set of
//! every event it shows, and the tag set's expiry is pushed out to the page's
//! TTL so a tag never expires before the pages it lists. Tag invalidation
//! runs as a single Lua script.

use super::{tag_key, ListingCache};
use crate::error::CacheError;
use crate::types::EventId;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Deletes every page in the tag set `KEYS[1]`, then the set; returns how
/// many pages the set listed.
const INVALIDATE_TAG_SCRIPT: &str = r"
    local pages = redis.call('SMEMBERS', KEYS[1])
    for _, page in ipairs(pages) do
        redis.call('DEL', page)
    end
    redis.call('DEL', KEYS[1])
    return #pages
";

/// Listing cache backed by Redis.
#[derive(Clone)]
pub struct RedisListingCache {
    conn_manager: ConnectionManager,
}

impl RedisListingCache {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;
        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

#[async_trait]
impl ListingCache for RedisListingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[EventId],
    ) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);
        let tag_ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);

        let mut pipe = redis::pipe();
        pipe.atomic().set_ex(key, value, ttl_seconds).ignore();
        for event_id in tags {
            let tag = tag_key(event_id);
            pipe.sadd(&tag, key).ignore().expire(&tag, tag_ttl).ignore();
        }
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn_manager.clone();
        let _: usize = conn.del(keys).await?;
        Ok(())
    }

    async fn invalidate_tag(&self, event_id: &EventId) -> Result<usize, CacheError> {
        let mut conn = self.conn_manager.clone();

        // One script so a page tagged concurrently is either deleted with the
        // set or lands in a fresh set, never in a set that is about to vanish.
        let script = redis::Script::new(INVALIDATE_TAG_SCRIPT);
        let listed: usize = script
            .key(tag_key(event_id))
            .invoke_async(&mut conn)
            .await?;

        tracing::debug!(event_id = %event_id, listed, "Invalidated tagged listing pages");
        Ok(listed)
    }
}
