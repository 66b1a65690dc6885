//! Commands and results of the registration mirror.

use crate::client::api::ApiError;
use crate::lifecycle::Cancellation;
use crate::types::{Event, EventId, Inscription, InscriptionId, ListingPage, ListingQuery};

/// Correlates a command with its result action.
pub type RequestId = u64;

/// Everything the mirror reacts to.
///
/// Commands carry a request id that the corresponding result repeats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsAction {
    // Commands
    /// Load one listing page
    LoadEvents {
        /// Correlation id
        request_id: RequestId,
        /// Page to load
        query: ListingQuery,
    },
    /// Load one event into the detail view
    LoadEvent {
        /// Correlation id
        request_id: RequestId,
        /// Event to load
        event_id: EventId,
    },
    /// Load the member's inscriptions
    LoadMyInscriptions {
        /// Correlation id
        request_id: RequestId,
    },
    /// Register for an event
    Register {
        /// Correlation id
        request_id: RequestId,
        /// Event to register for
        event_id: EventId,
    },
    /// Cancel an inscription
    Cancel {
        /// Correlation id
        request_id: RequestId,
        /// Inscription to cancel
        inscription_id: InscriptionId,
    },

    // Results
    /// A listing page arrived
    EventsLoaded {
        /// Correlation id
        request_id: RequestId,
        /// The page
        page: ListingPage,
    },
    /// An event arrived
    EventLoaded {
        /// Correlation id
        request_id: RequestId,
        /// The event
        event: Event,
    },
    /// The member's inscriptions arrived
    MyInscriptionsLoaded {
        /// Correlation id
        request_id: RequestId,
        /// Every inscription of the member
        inscriptions: Vec<Inscription>,
    },
    /// The server accepted a registration
    Registered {
        /// Correlation id
        request_id: RequestId,
        /// The created inscription
        inscription: Inscription,
    },
    /// The server confirmed a cancellation
    Cancelled {
        /// Correlation id
        request_id: RequestId,
        /// What the server reported, including the event's new counter
        cancellation: Cancellation,
    },
    /// A request failed
    RequestFailed {
        /// Correlation id
        request_id: RequestId,
        /// What went wrong
        error: ApiError,
    },
}

impl EventsAction {
    /// Correlation id of this action.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::LoadEvents { request_id, .. }
            | Self::LoadEvent { request_id, .. }
            | Self::LoadMyInscriptions { request_id }
            | Self::Register { request_id, .. }
            | Self::Cancel { request_id, .. }
            | Self::EventsLoaded { request_id, .. }
            | Self::EventLoaded { request_id, .. }
            | Self::MyInscriptionsLoaded { request_id, .. }
            | Self::Registered { request_id, .. }
            | Self::Cancelled { request_id, .. }
            | Self::RequestFailed { request_id, .. } => *request_id,
        }
    }

    /// Whether this action reports the outcome of a network call.
    #[must_use]
    pub const fn is_result(&self) -> bool {
        matches!(
            self,
            Self::EventsLoaded { .. }
                | Self::EventLoaded { .. }
                | Self::MyInscriptionsLoaded { .. }
                | Self::Registered { .. }
                | Self::Cancelled { .. }
                | Self::RequestFailed { .. }
        )
    }
}
