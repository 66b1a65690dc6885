//! Public event listing with a read-through cache.
//!
//! A page is served from the cache when present; otherwise it is read from
//! the store and written back with a TTL, tagged with every event it shows.
//! The cache fails open: any cache error is logged and the store answers.

use crate::cache::{ListingCache, ListingKey};
use crate::error::{InscriptionError, StoreError};
use crate::store::RegistrationStore;
use crate::types::{Event, EventId, ListingPage, ListingQuery};
use std::sync::Arc;
use std::time::Duration;

/// Event listing backed by the store and the listing cache.
#[derive(Clone)]
pub struct EventListingService {
    store: Arc<dyn RegistrationStore>,
    cache: Arc<dyn ListingCache>,
    ttl: Duration,
}

impl EventListingService {
    /// Create the service; cached pages live for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn RegistrationStore>, cache: Arc<dyn ListingCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// One page of events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the store itself fails; cache
    /// failures are absorbed.
    #[tracing::instrument(skip_all, fields(key))]
    pub async fn list(&self, query: ListingQuery) -> Result<ListingPage, StoreError> {
        let query = query.normalized();
        let key = ListingKey::for_query(&query).to_string();
        tracing::Span::current().record("key", key.as_str());

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<ListingPage>(&cached) {
                Ok(page) => {
                    metrics::counter!("aca_listing_cache_requests_total", "result" => "hit")
                        .increment(1);
                    return Ok(page);
                },
                Err(error) => {
                    tracing::warn!(%error, "Discarding undecodable cached listing page");
                },
            },
            Ok(None) => {},
            Err(error) => {
                metrics::counter!("aca_listing_cache_requests_total", "result" => "error")
                    .increment(1);
                tracing::warn!(%error, "Listing cache read failed, reading from store");
            },
        }
        metrics::counter!("aca_listing_cache_requests_total", "result" => "miss").increment(1);

        let page = self.store.list_events(&query).await?;
        self.write_back(&key, &page).await;
        Ok(page)
    }

    async fn write_back(&self, key: &str, page: &ListingPage) {
        let value = match serde_json::to_string(page) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "Could not serialize listing page");
                return;
            },
        };
        let tags: Vec<EventId> = page.events.iter().map(|e| e.id.clone()).collect();

        if let Err(error) = self.cache.put(key, &value, self.ttl, &tags).await {
            tracing::warn!(%error, "Listing cache write failed");
        }
    }

    /// One event, read from the store.
    ///
    /// # Errors
    ///
    /// [`InscriptionError::EventNotFound`] or [`InscriptionError::Storage`].
    #[tracing::instrument(skip_all, fields(event_id = %event_id))]
    pub async fn get_event(&self, event_id: &EventId) -> Result<Event, InscriptionError> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or_else(|| InscriptionError::EventNotFound(event_id.clone()))
    }
}
