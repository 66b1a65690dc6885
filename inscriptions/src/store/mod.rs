//! Relational store for events and inscriptions.
//!
//! The store owns the durable truth. Seat counters are only changed through
//! [`RegistrationStore::release_seat`] and [`RegistrationStore::claim_seat`],
//! each a single atomic update; application code never reads a counter and
//! writes it back.
//!
//! Backends with transactions override [`RegistrationStore::cancel_inscription`]
//! and [`RegistrationStore::register`] to apply both writes or neither. The
//! provided implementations run the writes one after the other and report a
//! counter failure after a committed delete as
//! [`CancelWriteError::PartiallyApplied`].

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryRegistrationStore, StoreSnapshot};
pub use postgres::PostgresRegistrationStore;

use crate::error::StoreError;
use crate::types::{
    Event, EventId, Inscription, InscriptionId, InscriptionStatus, ListingPage, ListingQuery,
    UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a completed cancellation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Event counter after the write; `None` when the counter was not touched
    /// or the event row no longer exists
    pub current_participants: Option<u32>,
}

/// Why a cancellation write did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CancelWriteError {
    /// The row was already gone when the delete ran
    #[error("inscription already deleted")]
    Gone,

    /// Nothing was written
    #[error("cancellation not applied: {0}")]
    NotApplied(#[source] StoreError),

    /// The row was deleted, the counter update failed
    #[error("inscription deleted, counter not updated: {0}")]
    PartiallyApplied(#[source] StoreError),
}

/// Persistence operations used by the inscription lifecycle and the listing.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Load one inscription.
    async fn find_inscription(&self, id: &InscriptionId)
    -> Result<Option<Inscription>, StoreError>;

    /// All inscriptions of a user, newest first.
    async fn list_user_inscriptions(&self, user_id: &UserId)
    -> Result<Vec<Inscription>, StoreError>;

    /// The user's non-cancelled inscription for an event, if any.
    async fn find_active_inscription(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Inscription>, StoreError>;

    /// Load one event.
    async fn find_event(&self, id: &EventId) -> Result<Option<Event>, StoreError>;

    /// One page of events matching the query, ordered by start time.
    async fn list_events(&self, query: &ListingQuery) -> Result<ListingPage, StoreError>;

    /// Insert an inscription row.
    ///
    /// Fails with [`StoreError::DuplicateActive`] if the user already holds an
    /// active inscription for the event.
    async fn insert_inscription(&self, inscription: &Inscription) -> Result<(), StoreError>;

    /// Delete an inscription row. Returns whether a row was deleted.
    async fn delete_inscription(&self, id: &InscriptionId) -> Result<bool, StoreError>;

    /// Decrement the event counter, floored at zero.
    ///
    /// Returns the new count, or `None` if the event does not exist.
    async fn release_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError>;

    /// Increment the event counter if a seat is free.
    ///
    /// Returns the new count, or `None` when the event is full or missing.
    async fn claim_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError>;

    /// Delete the inscription and release its seat if it held one.
    async fn cancel_inscription(
        &self,
        inscription: &Inscription,
    ) -> Result<CancelOutcome, CancelWriteError> {
        let deleted = self
            .delete_inscription(&inscription.id)
            .await
            .map_err(CancelWriteError::NotApplied)?;
        if !deleted {
            return Err(CancelWriteError::Gone);
        }

        if !inscription.status.holds_seat() {
            return Ok(CancelOutcome {
                current_participants: None,
            });
        }

        let current_participants = self
            .release_seat(&inscription.event_id)
            .await
            .map_err(CancelWriteError::PartiallyApplied)?;

        Ok(CancelOutcome {
            current_participants,
        })
    }

    /// Create an inscription, confirmed if a seat could be claimed and
    /// waitlisted otherwise.
    async fn register(
        &self,
        id: InscriptionId,
        user_id: &UserId,
        event_id: &EventId,
        created_at: DateTime<Utc>,
    ) -> Result<Inscription, StoreError> {
        let claimed = self.claim_seat(event_id).await?.is_some();
        let inscription = Inscription {
            id,
            user_id: user_id.clone(),
            event_id: event_id.clone(),
            status: if claimed {
                InscriptionStatus::Confirmed
            } else {
                InscriptionStatus::Waitlist
            },
            created_at,
        };

        if let Err(err) = self.insert_inscription(&inscription).await {
            if claimed {
                if let Err(release_err) = self.release_seat(event_id).await {
                    tracing::error!(
                        event_id = %event_id,
                        error = %release_err,
                        "Could not return claimed seat after failed insert"
                    );
                }
            }
            return Err(err);
        }

        Ok(inscription)
    }
}
