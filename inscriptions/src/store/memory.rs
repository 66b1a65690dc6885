//! In-memory registration store.
//!
//! Used by tests and local development. Each operation runs under one mutex,
//! so single statements are atomic, but cancellation and registration go
//! through the sequential default implementations of [`RegistrationStore`].
//! Failure injection switches make the next delete or counter update fail,
//! which is how partial application is exercised.

use super::RegistrationStore;
use crate::error::StoreError;
use crate::types::{Event, EventId, Inscription, InscriptionId, ListingPage, ListingQuery, UserId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default, Clone)]
struct Tables {
    events: BTreeMap<EventId, Event>,
    inscriptions: BTreeMap<InscriptionId, Inscription>,
}

/// Copy of every row, for asserting that an operation wrote nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// Events by id
    pub events: Vec<Event>,
    /// Inscriptions by id
    pub inscriptions: Vec<Inscription>,
}

/// Mutex-guarded tables with failure injection.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationStore {
    tables: Mutex<Tables>,
    fail_next_delete: AtomicBool,
    fail_next_release: AtomicBool,
}

impl InMemoryRegistrationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an event row.
    pub fn put_event(&self, event: Event) {
        self.tables().events.insert(event.id.clone(), event);
    }

    /// Insert or replace an inscription row without touching counters.
    pub fn put_inscription(&self, inscription: Inscription) {
        self.tables()
            .inscriptions
            .insert(inscription.id.clone(), inscription);
    }

    /// Current counter of an event.
    #[must_use]
    pub fn participants(&self, event_id: &EventId) -> Option<u32> {
        self.tables()
            .events
            .get(event_id)
            .map(|e| e.current_participants)
    }

    /// Copy of every row.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables();
        StoreSnapshot {
            events: tables.events.values().cloned().collect(),
            inscriptions: tables.inscriptions.values().cloned().collect(),
        }
    }

    /// Make the next `delete_inscription` fail without deleting.
    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    /// Make the next `release_seat` fail without updating the counter.
    pub fn fail_next_release(&self) {
        self.fail_next_release.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn find_inscription(
        &self,
        id: &InscriptionId,
    ) -> Result<Option<Inscription>, StoreError> {
        Ok(self.tables().inscriptions.get(id).cloned())
    }

    async fn list_user_inscriptions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Inscription>, StoreError> {
        let mut mine: Vec<Inscription> = self
            .tables()
            .inscriptions
            .values()
            .filter(|i| &i.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn find_active_inscription(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Inscription>, StoreError> {
        Ok(self
            .tables()
            .inscriptions
            .values()
            .find(|i| &i.user_id == user_id && &i.event_id == event_id && i.status.is_active())
            .cloned())
    }

    async fn find_event(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.tables().events.get(id).cloned())
    }

    async fn list_events(&self, query: &ListingQuery) -> Result<ListingPage, StoreError> {
        let mut matching: Vec<Event> = self
            .tables()
            .events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let events = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect();

        Ok(ListingPage {
            events,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    async fn insert_inscription(&self, inscription: &Inscription) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let duplicate = inscription.status.is_active()
            && tables.inscriptions.values().any(|i| {
                i.user_id == inscription.user_id
                    && i.event_id == inscription.event_id
                    && i.status.is_active()
            });
        if duplicate {
            return Err(StoreError::DuplicateActive(inscription.event_id.clone()));
        }
        tables
            .inscriptions
            .insert(inscription.id.clone(), inscription.clone());
        Ok(())
    }

    async fn delete_inscription(&self, id: &InscriptionId) -> Result<bool, StoreError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        Ok(self.tables().inscriptions.remove(id).is_some())
    }

    async fn release_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError> {
        if self.fail_next_release.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected counter failure".to_string(),
            ));
        }
        Ok(self.tables().events.get_mut(event_id).map(|event| {
            event.current_participants = event.current_participants.saturating_sub(1);
            event.current_participants
        }))
    }

    async fn claim_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError> {
        Ok(self
            .tables()
            .events
            .get_mut(event_id)
            .filter(|event| event.has_free_seat())
            .map(|event| {
                event.current_participants += 1;
                event.current_participants
            }))
    }
}
