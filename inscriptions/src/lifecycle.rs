//! Inscription lifecycle.
//!
//! Cancelling an inscription:
//!
//! 1. look up the inscription (`NotFound` if missing)
//! 2. check the requester may act on it (`Unauthorized`)
//! 3. reject rows already marked `cancelled`
//! 4. delete the row and release its seat, atomically where the store can
//! 5. invalidate cached listings of the event, best-effort
//!
//! A retry after a successful cancel reports `NotFound`, which callers treat
//! as the terminal state. Registration claims a seat with one conditional
//! increment and falls back to the waitlist when none is free.

use crate::auth::AuthenticatedUser;
use crate::cache::CacheInvalidator;
use crate::error::{InscriptionError, StoreError};
use crate::store::{CancelWriteError, RegistrationStore};
use crate::types::{EventId, Inscription, InscriptionId, InscriptionStatus};
use aca_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who may act on someone else's inscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancellationPolicy {
    /// Only the owner
    #[default]
    OwnerOnly,
    /// The owner, organizers and admins
    OwnerOrStaff,
}

impl CancellationPolicy {
    /// Policy for the `INSCRIPTIONS_STAFF_OVERRIDE` switch.
    #[must_use]
    pub const fn from_staff_override(enabled: bool) -> Self {
        if enabled {
            Self::OwnerOrStaff
        } else {
            Self::OwnerOnly
        }
    }

    /// Whether `user` may read or cancel `inscription`.
    #[must_use]
    pub fn permits(self, user: &AuthenticatedUser, inscription: &Inscription) -> bool {
        let is_owner = user.user_id == inscription.user_id;
        match self {
            Self::OwnerOnly => is_owner,
            Self::OwnerOrStaff => is_owner || user.role.is_staff(),
        }
    }
}

/// A completed cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    /// The deleted inscription
    pub inscription_id: InscriptionId,
    /// Its event
    pub event_id: EventId,
    /// The event counter after the cancel, when it was updated
    pub current_participants: Option<u32>,
}

/// Inscription operations for authenticated members.
#[derive(Clone)]
pub struct InscriptionService {
    store: Arc<dyn RegistrationStore>,
    invalidator: CacheInvalidator,
    policy: CancellationPolicy,
    clock: Arc<dyn Clock>,
}

impl InscriptionService {
    /// Create the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        invalidator: CacheInvalidator,
        policy: CancellationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            invalidator,
            policy,
            clock,
        }
    }

    /// Cancel an inscription on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// - [`InscriptionError::NotFound`]: no such inscription, including when a
    ///   concurrent cancel deleted it first
    /// - [`InscriptionError::Unauthorized`]: the requester may not cancel it
    /// - [`InscriptionError::BusinessRule`]: the row is already `cancelled`
    /// - [`InscriptionError::Storage`]: nothing was applied, safe to retry
    /// - [`InscriptionError::PartiallyApplied`]: the row is gone but the
    ///   event counter was not decremented
    #[tracing::instrument(
        skip_all,
        fields(inscription_id = %inscription_id, user_id = %requester.user_id)
    )]
    pub async fn cancel(
        &self,
        inscription_id: &InscriptionId,
        requester: &AuthenticatedUser,
    ) -> Result<Cancellation, InscriptionError> {
        let result = self.cancel_inner(inscription_id, requester).await;
        match &result {
            Ok(cancellation) => {
                metrics::counter!("aca_inscriptions_cancelled_total").increment(1);
                tracing::info!(
                    event_id = %cancellation.event_id,
                    current_participants = ?cancellation.current_participants,
                    "Inscription cancelled"
                );
            },
            Err(err) => {
                metrics::counter!("aca_inscription_cancel_failures_total", "kind" => err.kind())
                    .increment(1);
            },
        }
        result
    }

    async fn cancel_inner(
        &self,
        inscription_id: &InscriptionId,
        requester: &AuthenticatedUser,
    ) -> Result<Cancellation, InscriptionError> {
        let inscription = self.load_permitted(inscription_id, requester).await?;

        if inscription.status == InscriptionStatus::Cancelled {
            return Err(InscriptionError::BusinessRule(
                "Inscription is already cancelled".to_string(),
            ));
        }

        let outcome = match self.store.cancel_inscription(&inscription).await {
            Ok(outcome) => outcome,
            Err(CancelWriteError::Gone) => {
                tracing::debug!("Inscription deleted concurrently");
                return Err(InscriptionError::NotFound(inscription_id.clone()));
            },
            Err(CancelWriteError::NotApplied(source)) => {
                tracing::error!(error = %source, "Cancellation failed, nothing applied");
                return Err(InscriptionError::Storage(source));
            },
            Err(CancelWriteError::PartiallyApplied(source)) => {
                metrics::counter!("aca_participant_counter_drift_total").increment(1);
                tracing::error!(
                    event_id = %inscription.event_id,
                    error = %source,
                    "Inscription deleted but participant counter not decremented"
                );
                // The listing changed even though the counter did not.
                self.invalidator
                    .invalidate_event(&inscription.event_id)
                    .await;
                return Err(InscriptionError::PartiallyApplied {
                    inscription_id: inscription.id,
                    event_id: inscription.event_id,
                    source,
                });
            },
        };

        self.invalidator
            .invalidate_event(&inscription.event_id)
            .await;

        Ok(Cancellation {
            inscription_id: inscription.id,
            event_id: inscription.event_id,
            current_participants: outcome.current_participants,
        })
    }

    /// Read one inscription.
    ///
    /// # Errors
    ///
    /// [`InscriptionError::NotFound`], [`InscriptionError::Unauthorized`] or
    /// [`InscriptionError::Storage`].
    #[tracing::instrument(
        skip_all,
        fields(inscription_id = %inscription_id, user_id = %requester.user_id)
    )]
    pub async fn get(
        &self,
        inscription_id: &InscriptionId,
        requester: &AuthenticatedUser,
    ) -> Result<Inscription, InscriptionError> {
        self.load_permitted(inscription_id, requester).await
    }

    /// Every inscription of the requester, newest first.
    ///
    /// # Errors
    ///
    /// [`InscriptionError::Storage`] on store failure.
    #[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
    pub async fn list_mine(
        &self,
        requester: &AuthenticatedUser,
    ) -> Result<Vec<Inscription>, InscriptionError> {
        Ok(self
            .store
            .list_user_inscriptions(&requester.user_id)
            .await?)
    }

    /// Register the requester for an event.
    ///
    /// The inscription is `confirmed` when a seat was claimed and `waitlist`
    /// when the event is full.
    ///
    /// # Errors
    ///
    /// - [`InscriptionError::EventNotFound`]: no such event
    /// - [`InscriptionError::BusinessRule`]: registration closed, or the
    ///   requester already holds an active inscription
    /// - [`InscriptionError::Storage`]: nothing was applied
    #[tracing::instrument(skip_all, fields(event_id = %event_id, user_id = %requester.user_id))]
    pub async fn inscribe(
        &self,
        event_id: &EventId,
        requester: &AuthenticatedUser,
    ) -> Result<Inscription, InscriptionError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or_else(|| InscriptionError::EventNotFound(event_id.clone()))?;

        if !event.accepts_inscriptions() {
            return Err(InscriptionError::BusinessRule(
                "Registration is closed for this event".to_string(),
            ));
        }

        let already_registered = || {
            InscriptionError::BusinessRule("You are already registered for this event".to_string())
        };
        if self
            .store
            .find_active_inscription(&requester.user_id, event_id)
            .await?
            .is_some()
        {
            return Err(already_registered());
        }

        let inscription = match self
            .store
            .register(
                InscriptionId::new(),
                &requester.user_id,
                event_id,
                self.clock.now(),
            )
            .await
        {
            Ok(inscription) => inscription,
            Err(StoreError::DuplicateActive(_)) => return Err(already_registered()),
            Err(err) => return Err(err.into()),
        };

        metrics::counter!(
            "aca_inscriptions_created_total",
            "status" => inscription.status.as_str()
        )
        .increment(1);
        tracing::info!(
            inscription_id = %inscription.id,
            status = inscription.status.as_str(),
            "Inscription created"
        );

        self.invalidator.invalidate_event(event_id).await;
        Ok(inscription)
    }

    async fn load_permitted(
        &self,
        inscription_id: &InscriptionId,
        requester: &AuthenticatedUser,
    ) -> Result<Inscription, InscriptionError> {
        let inscription = self
            .store
            .find_inscription(inscription_id)
            .await?
            .ok_or_else(|| InscriptionError::NotFound(inscription_id.clone()))?;

        if !self.policy.permits(requester, &inscription) {
            tracing::debug!(owner = %inscription.user_id, "Requester does not own inscription");
            return Err(InscriptionError::Unauthorized(inscription_id.clone()));
        }
        Ok(inscription)
    }
}
