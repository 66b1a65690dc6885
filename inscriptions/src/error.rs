//! Error types for the inscriptions service.
//!
//! Storage, cache and session errors stay close to their backends. The
//! lifecycle service folds them into [`InscriptionError`], which the HTTP
//! layer turns into an [`AppError`] envelope.

use crate::types::{EventId, InscriptionId, UnknownVariant};
use aca_web::AppError;
use thiserror::Error;

/// Relational store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The user already holds an active inscription for the event
    #[error("active inscription already exists for event {0}")]
    DuplicateActive(EventId),

    /// A stored value could not be mapped to the domain model
    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),

    /// The backend is unreachable (in-memory failure injection)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Listing cache failures. Always swallowed by callers.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Redis command failure
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cached page could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend is unreachable (in-memory failure injection)
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Session verification failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown or expired token
    #[error("invalid or expired session")]
    InvalidSession,

    /// Session payload could not be decoded
    #[error("malformed session: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Session backend failure
    #[error("session backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Outcome of an inscription operation that did not succeed.
#[derive(Error, Debug)]
pub enum InscriptionError {
    /// The inscription id does not resolve
    #[error("inscription {0} not found")]
    NotFound(InscriptionId),

    /// The event id does not resolve
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// Authenticated, but not allowed to act on the inscription
    #[error("not allowed to act on inscription {0}")]
    Unauthorized(InscriptionId),

    /// A precondition of the operation was not met
    #[error("{0}")]
    BusinessRule(String),

    /// Storage failed and nothing was applied
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// The inscription was deleted but the event counter was not updated
    #[error("inscription {inscription_id} deleted but counter of event {event_id} not updated: {source}")]
    PartiallyApplied {
        /// Deleted inscription
        inscription_id: InscriptionId,
        /// Event whose counter drifted
        event_id: EventId,
        /// Failure of the counter update
        source: StoreError,
    },
}

impl InscriptionError {
    /// Short label used for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::EventNotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BusinessRule(_) => "business_rule",
            Self::Storage(_) => "internal",
            Self::PartiallyApplied { .. } => "partially_applied",
        }
    }
}

impl From<InscriptionError> for AppError {
    fn from(err: InscriptionError) -> Self {
        match err {
            InscriptionError::NotFound(_) => Self::not_found("Inscription"),
            InscriptionError::EventNotFound(_) => Self::not_found("Event"),
            InscriptionError::Unauthorized(_) => {
                Self::forbidden("You do not have permission to modify this inscription")
            },
            InscriptionError::BusinessRule(message) => Self::bad_request(message),
            InscriptionError::Storage(source) => {
                Self::internal("An internal error occurred").with_source(source)
            },
            err @ InscriptionError::PartiallyApplied { .. } => Self::partially_applied(
                "The inscription was removed but the event could not be updated",
            )
            .with_source(err),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidSession | AuthError::Malformed(_) => {
                Self::unauthorized("Invalid or expired session").with_source(err)
            },
            AuthError::Backend(_) => Self::internal("An internal error occurred").with_source(err),
        }
    }
}
