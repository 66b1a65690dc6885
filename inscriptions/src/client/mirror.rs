//! Request/response facade over the mirror store.

use crate::client::action::{EventsAction, RequestId};
use crate::client::api::{ApiError, InscriptionsApi};
use crate::client::reducer::{EventsEnvironment, EventsReducer};
use crate::client::state::EventsState;
use crate::lifecycle::Cancellation;
use crate::types::{Event, EventId, Inscription, InscriptionId, ListingPage, ListingQuery};
use aca_runtime::Store;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a call waits for its result action by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of a mirror call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// The API call failed; the mirror is unchanged
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No result arrived in time
    #[error("no result for request {request_id}: {source}")]
    NoResult {
        /// The unanswered request
        request_id: RequestId,
        /// Why waiting stopped
        source: aca_runtime::StoreError,
    },

    /// A result of the wrong kind arrived for the request
    #[error("unexpected result for request {0}")]
    UnexpectedResult(RequestId),
}

type MirrorStore = Store<EventsState, EventsAction, EventsEnvironment, EventsReducer>;

/// The client's registration mirror.
///
/// Each method sends one command and waits for the result action carrying
/// the same request id. By the time a method returns, the state already
/// reflects the result.
pub struct RegistrationMirror {
    store: MirrorStore,
    next_request: AtomicU64,
    timeout: Duration,
}

impl RegistrationMirror {
    /// Empty mirror talking to `api`.
    #[must_use]
    pub fn new(api: Arc<dyn InscriptionsApi>) -> Self {
        Self::with_state(api, EventsState::default())
    }

    /// Mirror starting from `state`.
    #[must_use]
    pub fn with_state(api: Arc<dyn InscriptionsApi>, state: EventsState) -> Self {
        Self {
            store: Store::new(state, EventsReducer::new(), EventsEnvironment::new(api)),
            next_request: AtomicU64::new(1),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Change how long calls wait for their result.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dispatch<F>(&self, command: F) -> Result<EventsAction, MirrorError>
    where
        F: FnOnce(RequestId) -> EventsAction,
    {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let result = self
            .store
            .send_and_wait_for(
                command(request_id),
                move |action| action.is_result() && action.request_id() == request_id,
                self.timeout,
            )
            .await
            .map_err(|source| MirrorError::NoResult { request_id, source })?;

        match result {
            EventsAction::RequestFailed { error, .. } => Err(error.into()),
            other => Ok(other),
        }
    }

    /// Load one listing page into `events`.
    ///
    /// # Errors
    ///
    /// [`MirrorError`] when the call fails or times out.
    pub async fn load_events(&self, query: ListingQuery) -> Result<ListingPage, MirrorError> {
        match self
            .dispatch(|request_id| EventsAction::LoadEvents { request_id, query })
            .await?
        {
            EventsAction::EventsLoaded { page, .. } => Ok(page),
            other => Err(MirrorError::UnexpectedResult(other.request_id())),
        }
    }

    /// Load one event into `current_event`.
    ///
    /// # Errors
    ///
    /// [`MirrorError`] when the call fails or times out.
    pub async fn load_event(&self, event_id: EventId) -> Result<Event, MirrorError> {
        match self
            .dispatch(|request_id| EventsAction::LoadEvent {
                request_id,
                event_id,
            })
            .await?
        {
            EventsAction::EventLoaded { event, .. } => Ok(event),
            other => Err(MirrorError::UnexpectedResult(other.request_id())),
        }
    }

    /// Load the member's inscriptions.
    ///
    /// # Errors
    ///
    /// [`MirrorError`] when the call fails or times out.
    pub async fn load_my_inscriptions(&self) -> Result<Vec<Inscription>, MirrorError> {
        match self
            .dispatch(|request_id| EventsAction::LoadMyInscriptions { request_id })
            .await?
        {
            EventsAction::MyInscriptionsLoaded { inscriptions, .. } => Ok(inscriptions),
            other => Err(MirrorError::UnexpectedResult(other.request_id())),
        }
    }

    /// Register for an event.
    ///
    /// # Errors
    ///
    /// [`MirrorError`] when the call fails or times out.
    pub async fn register(&self, event_id: EventId) -> Result<Inscription, MirrorError> {
        match self
            .dispatch(|request_id| EventsAction::Register {
                request_id,
                event_id,
            })
            .await?
        {
            EventsAction::Registered { inscription, .. } => Ok(inscription),
            other => Err(MirrorError::UnexpectedResult(other.request_id())),
        }
    }

    /// Cancel an inscription. The mirror changes only once the server
    /// confirms.
    ///
    /// # Errors
    ///
    /// [`MirrorError`] when the call fails or times out.
    pub async fn cancel(&self, inscription_id: InscriptionId) -> Result<Cancellation, MirrorError> {
        match self
            .dispatch(|request_id| EventsAction::Cancel {
                request_id,
                inscription_id,
            })
            .await?
        {
            EventsAction::Cancelled { cancellation, .. } => Ok(cancellation),
            other => Err(MirrorError::UnexpectedResult(other.request_id())),
        }
    }

    /// Whether the member holds an active inscription for `event_id`.
    pub async fn is_registered(&self, event_id: &EventId) -> bool {
        self.store.state(|s| s.is_registered(event_id)).await
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> EventsState {
        self.store.state(Clone::clone).await
    }
}
